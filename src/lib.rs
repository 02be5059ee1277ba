//! docbind - incremental document framing and typed collection access
//!
//! The crate has three layers:
//!
//! - [`framer`]: a byte-at-a-time state machine that reassembles
//!   length-prefixed binary documents from a stream and hands each
//!   completed frame to a [`framer::DocumentSink`].
//! - [`mapper`]: a visitation contract ([`mapper::Record`]) that moves
//!   plain structs in and out of [`document::Document`] values without
//!   a derive step.
//! - [`collection`]: a typed facade ([`collection::TypedCollection`])
//!   over a [`collection::RawCollection`] store, with lazily
//!   deserializing cursors.
//!
//! ```
//! use docbind::collection::{MemoryCollection, TypedCollection};
//! use docbind::doc;
//! use docbind::impl_record;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Foo {
//!     a: i32,
//!     b: i32,
//! }
//! impl_record!(Foo { a, b });
//!
//! let mut coll = TypedCollection::<Foo>::new(Box::new(MemoryCollection::new()));
//! coll.insert_one(&Foo { a: 1, b: 4 })?;
//! let found = coll.find_one(doc! { "a" => 1 })?;
//! assert_eq!(found, Some(Foo { a: 1, b: 4 }));
//! # Ok::<(), docbind::error::OdmError>(())
//! ```

pub mod collection;
pub mod document;
pub mod error;
pub mod framer;
pub mod mapper;

pub use collection::{MemoryCollection, RawCollection, TypedCollection};
pub use document::{Document, ObjectId, Value, MAX_DOCUMENT_SIZE};
pub use error::{OdmError, Result};
pub use framer::{DocumentFramer, DocumentSink, FrameEvent};
pub use mapper::{to_document, to_optional_record, to_record, Record};
