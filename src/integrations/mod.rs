//! Outbound HTTP clients for third-party providers.

pub mod payments;
pub mod shipping;

pub use payments::{IntentRequest, PaymentGateway, PaymentIntent, StripeClient};
pub use shipping::{MelhorEnvioClient, RateAggregator, RateRequest, RawQuote};
