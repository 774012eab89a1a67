//! 인증/인가를 위한 도메인 모델.

mod access;
mod identity;
mod store;

pub use access::*;
pub use identity::*;
pub use store::*;
