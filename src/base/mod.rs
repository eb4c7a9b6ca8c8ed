//! Binary base files.
//!
//! A base file persists per-prefix records compactly for offline
//! reuse: a raw DEFLATE stream (best speed) of fixed-size records,
//! each a 24-byte prefix vector followed by a schema-fixed payload.
//! Order is preserved: records come back in write order.

mod reader;
mod record;
mod vector;
mod writer;


pub use reader::BaseReader;
pub use record::{
    CompanyRecord, CountryRecord, ReadableRecord, WritableRecord, COMPANY_FIELD_SIZE,
    COMPANY_RECORD_SIZE, COUNTRY_CODE_SIZE, COUNTRY_RECORD_SIZE,
};
pub use vector::{PrefixVector, PREFIX_VECTOR_SIZE};
pub use writer::BaseWriter;
