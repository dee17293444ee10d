pub mod email;
pub mod pix;
pub mod portrait;

pub use email::{MailError, Mailer, OutboundEmail, RestMailer};
pub use pix::{
    AbacatePixGateway, ChargeCustomer, CreateChargeRequest, GatewayError, PixCharge,
    PixChargeState, PixGateway,
};
pub use portrait::{AimlPortraitEngine, EngineError, PortraitEngine};
