//! Salesforce REST client for the quotation wizard: token acquisition, the two record
//! updates, and normalization of their replies.

pub mod client;
pub mod payload;
pub mod response;
pub mod token;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::SalesforceSync;
pub use token::{acquire_token, AuthToken};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport, TransportError};
