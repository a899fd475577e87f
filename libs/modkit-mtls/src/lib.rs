#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Mutual TLS HTTPS client infrastructure for `ModKit`
//!
//! This crate builds a pooled hyper client that authenticates itself with a
//! client certificate and validates servers against a **merged** trust
//! authority:
//! - an operator-supplied trust store (PKCS#12) is consulted first
//! - the platform trust anchors are the fallback when it rejects a chain
//! - only the platform anchors are advertised as accepted issuers
//!
//! Server hostnames are **not** verified. A server is accepted when its chain
//! leads to a trusted root, whatever name it was reached by.
//!
//! # Pipeline
//!
//! ```text
//! MtlsClientConfig
//!   └─ load_identity ─────────────► IdentityMaterial ─┐
//!   └─ load_platform_authority ─┐                     │
//!   └─ load_custom_authority ───┴─ merge_authorities ─┴─ build_context
//!                                                           │
//!                                                       TlsContext
//!                                                           │
//!                                                HttpClientBuilder::build
//!                                                           │
//!                                                       HttpClient
//! ```
//!
//! Every step fails fast with a [`TlsSetupError`]; a failed build never
//! yields a client.
//!
//! # Example
//!
//! ```ignore
//! use modkit_mtls::{HttpClient, MtlsClientConfig, Passphrase};
//!
//! let config = MtlsClientConfig::new(
//!     "/etc/partner/trust.p12",
//!     Passphrase::new("trust-secret"),
//!     "/etc/partner/client.p12",
//!     Passphrase::new("key-secret"),
//! );
//!
//! let client = HttpClient::builder(config).build()?;
//! let resp = client.get("https://partner.internal/api/status").await?;
//! ```

mod builder;
mod client;
mod config;
mod context;
mod error;
mod identity;
mod secret;
mod store;
mod tls;
pub mod trust;

pub use builder::HttpClientBuilder;
pub use client::{HttpClient, PooledClient};
pub use config::{DEFAULT_TLS_VERSION, MtlsClientConfig, PlatformRoots, PoolConfig};
pub use context::{TlsContext, build_context, build_tls_context};
pub use error::{
    AuthorityRole, CertificateValidationError, HttpError, InvalidUriKind, TlsSetupError,
};
pub use identity::{IdentityMaterial, load_identity};
pub use secret::Passphrase;
pub use tls::TlsProtocol;
pub use trust::{
    MergedTrustAuthority, PresentedChain, RootTrustAuthority, TrustAuthority, load_custom_authority,
    load_platform_authority, merge_authorities,
};
