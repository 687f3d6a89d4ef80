mod overrides;
mod parse;
mod types;
mod validate;

pub use overrides::AddressWhitelist;
pub use parse::{load_configuration, parse_configuration_str};
pub use types::{
    AllowedHost, AttachmentSource, BodySource, ConfigMode, Configuration, ConnectionConfig,
    OAuthSettings, Overrides, Protocol, ProxySettings, SmtpSettings, SubjectSource,
};
pub use validate::validate_configuration;
