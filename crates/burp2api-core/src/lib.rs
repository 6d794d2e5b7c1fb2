//! burp2api Core Library
//!
//! This library reconstructs OpenAPI specifications from Burp Suite
//! proxy-history exports: it normalizes the captured traffic and maps the
//! resulting endpoint observations onto OpenAPI paths and operations.

pub mod burp;
pub mod config;
pub mod convert;
pub mod error;
pub mod normalize;
pub mod openapi;

pub use crate::{
    burp::{BurpExport, NormalizedExport, RawRecord},
    config::Config,
    convert::{convert, convert_file, Conversion, ConversionOutput},
    error::{Error, Result},
    normalize::{normalize, Method, NormalizedRecord},
    openapi::{to_openapi, OpenApiDocument},
};
