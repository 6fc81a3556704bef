pub mod connection;
pub mod constants;
pub mod device;
pub mod rpc;
pub mod signer;
