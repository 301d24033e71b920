pub mod hash;
pub mod jwt;
pub mod otp;
pub mod range;
