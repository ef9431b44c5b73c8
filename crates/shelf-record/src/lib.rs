//! Record model and markup codec for the shelf object store.
//!
//! A [`Record`] is the in-memory form of one persisted unit: either an
//! [`ObjectRecord`] (named fields holding scalars, single references or
//! reference lists) or a [`CollectionRecord`] (an ordered list of
//! references). [`RecordCodec`] translates records to and from their
//! on-disk markup:
//!
//! ```text
//! <isis oid="EMP:1" user="sven" ver="1A">
//!   <value field="name">Fred &amp; Co</value>
//!   <association field="manager" oid="EMP:2"/>
//!   <multiple-association field="reports">
//!     <element oid="EMP:3"/>
//!   </multiple-association>
//! </isis>
//! ```
//!
//! The codec does no file I/O. The lower-level [`MarkupReader`] and
//! [`MarkupWriter`] are shared with the index and counter formats.

pub mod codec;
pub mod error;
pub mod escape;
pub mod markup;
pub mod record;

pub use codec::RecordCodec;
pub use error::{CodecError, CodecResult};
pub use escape::{TextEscaper, XmlEscaper};
pub use markup::{MarkupEvent, MarkupReader, MarkupWriter};
pub use record::{CollectionRecord, FieldValue, Fields, ObjectRecord, Record, RecordKind};
