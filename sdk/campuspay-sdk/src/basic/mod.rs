pub mod balance;
pub mod link;
pub mod payment;
pub mod request;
pub mod transfer;

pub use link::PaymentLink;
pub use payment::{PaymentOutcome, PaymentSession};
pub use request::{PaymentKind, PaymentRequest, PaymentRequestBuilder};
