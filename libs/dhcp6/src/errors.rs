use dhcproto::error::EncodeError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0:?}")]
    IoError(#[from] std::io::Error),
    #[error("invalid listen address: {0:?}")]
    InvalidAddress(String),
    #[error("invalid listen port: {0:?}")]
    InvalidPort(String),
    #[error("no usable ipv6 interface found (address: {0:?})")]
    NoInterface(Option<String>),
    #[error("interface {0} has no hardware address")]
    NoHardwareAddress(String),
    #[error("failed to encode response: {0}")]
    Encode(#[from] EncodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
