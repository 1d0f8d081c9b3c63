//! # bitform
//!
//! Schema-driven decoding of binary formats.
//!
//! A format is described declaratively in YAML: an ordered `seq` of named
//! fields, nested user types, enums and computed or positioned instances.
//! Field attributes like sizes, guards and repeat counts are expressions in
//! an embedded language that can reference previously decoded fields, the
//! parent and root structs and enum symbols. Decoding walks the description
//! over a bit-level cursor and produces a named value tree.
//!
//! ## Example
//!
//! ```
//! use bitform::decode::decode;
//! use bitform::schema::Schema;
//! use bitform::tree::Node;
//!
//! let schema = Schema::parse_str(
//!     "
//! meta:
//!   endian: le
//! seq:
//!   - id: len
//!     type: u2
//!   - id: body
//!     size: len
//! ",
//! )
//! .unwrap();
//!
//! let tree = decode(&schema, &[0x02, 0x00, 0xaa, 0xbb]).unwrap();
//! assert_eq!(tree.get("len").unwrap().value, Node::UInt(2));
//! assert_eq!(tree.get("body").unwrap().value, Node::Bytes(vec![0xaa, 0xbb]));
//! ```

pub mod builtin;
pub mod decode;
pub mod errors;
pub mod expr;
pub mod reader;
pub mod schema;
pub mod tree;
pub mod value;
