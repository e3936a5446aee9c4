//! Hard input caps. These bound memory and index growth; requests beyond
//! them are rejected, never truncated.

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_CONSULTANTS: usize = 10_000;
