//! The schema-driven decode engine.
//!
//! Decoding walks the schema's `seq` against a bit cursor, building the
//! output tree and a parallel arena of contexts. A context is one decoded
//! struct: its spec, its parent link, the bit region of its stream and the
//! values its fields produced. Expression evaluation hands out contexts as
//! opaque scope values, so `_parent.len` and `_root.hdr` resolve through the
//! arena without the expression engine knowing anything about decoding.
//!
//! Instances resolve lazily while expressions run and eagerly once the
//! owning struct's `seq` is done, each at most once. An instance currently
//! being resolved is marked, so a dependency back onto itself is reported
//! instead of recursing forever.

use std::collections::HashMap;

use crate::builtin::{self, Builtin, Encoding};
use crate::errors::{DecodeError, EvalError};
use crate::expr::ops::value_eq;
use crate::expr::{Expr, Resolve};
use crate::reader::{ByteOrder, Reader};
use crate::schema::{EnumSpec, Repeat, Schema, TypeRef, TypeSpec};
use crate::tree::{Node, Struct};
use crate::value::{ScopeRef, Value};

/// Decodes `data` against the schema's root type.
pub fn decode(schema: &Schema, data: &[u8]) -> Result<Struct, DecodeError> {
    let mut dec = Decoder {
        data,
        ctxs: Vec::new(),
    };
    let mut rd = Reader::new(data);
    if let Some(e) = schema.root.endian {
        rd.endian = e;
    }
    if let Some(e) = schema.root.bit_endian {
        rd.bit_endian = e;
    }
    let root = dec.push_ctx(&schema.root, None, rd.region(), rd.endian, rd.bit_endian);
    dec.decode_struct(root, &mut rd)?;
    Ok(std::mem::take(&mut dec.ctxs[root].strukt))
}

enum InstanceSlot {
    Resolving,
    Done(Value),
}

/// One decoded struct: spec, stream region and everything its fields
/// produced so far.
struct Context<'s> {
    spec: &'s TypeSpec,
    parent: Option<usize>,
    /// Bit bounds of this context's stream; instance positions are relative
    /// to its start.
    region: (usize, usize),
    endian: ByteOrder,
    bit_endian: ByteOrder,
    strukt: Struct,
    /// Expression-language view of every decoded field, by name.
    vals: HashMap<String, Value>,
    /// Most recently decoded value in this context (`_`).
    last: Option<Value>,
    instances: HashMap<String, InstanceSlot>,
}

struct Decoder<'s, 'a> {
    data: &'a [u8],
    ctxs: Vec<Context<'s>>,
}

impl<'s, 'a> Decoder<'s, 'a> {
    fn push_ctx(
        &mut self,
        spec: &'s TypeSpec,
        parent: Option<usize>,
        region: (usize, usize),
        endian: ByteOrder,
        bit_endian: ByteOrder,
    ) -> usize {
        self.ctxs.push(Context {
            spec,
            parent,
            region,
            endian,
            bit_endian,
            strukt: Struct::default(),
            vals: HashMap::new(),
            last: None,
            instances: HashMap::new(),
        });
        self.ctxs.len() - 1
    }

    /// Walks the context chain upward looking for a named user type.
    fn find_type(&self, ctx: usize, name: &str) -> Option<&'s TypeSpec> {
        let mut c = ctx;
        loop {
            let spec = self.ctxs[c].spec;
            if let Some(t) = spec.types.get(name) {
                return Some(t);
            }
            c = self.ctxs[c].parent?;
        }
    }

    /// Walks the context chain upward looking for a named enum.
    fn find_enum(&self, ctx: usize, name: &str) -> Option<&'s EnumSpec> {
        let mut c = ctx;
        loop {
            let spec = self.ctxs[c].spec;
            if let Some(e) = spec.enums.get(name) {
                return Some(e);
            }
            c = self.ctxs[c].parent?;
        }
    }

    fn decode_struct(&mut self, ctx: usize, rd: &mut Reader<'a>) -> Result<(), DecodeError> {
        let spec = self.ctxs[ctx].spec;
        for field in &spec.seq {
            self.decode_field(ctx, field, rd)?;
        }
        for name in spec.instances.keys() {
            self.resolve_instance(ctx, name, rd)?;
        }
        Ok(())
    }

    fn decode_field(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        rd: &mut Reader<'a>,
    ) -> Result<(), DecodeError> {
        if let Some(cond) = &field.cond {
            if !self.eval_bool(ctx, rd, &field.id, "if", cond)? {
                return Ok(());
            }
        }

        if field.repeat != Repeat::None {
            // `last` tracks the elements as they decode, never the array
            let (node, val) = self.decode_repeat(ctx, field, rd)?;
            let c = &mut self.ctxs[ctx];
            c.vals.insert(field.id.clone(), val);
            c.strukt.push(field.id.clone(), node, None);
            return Ok(());
        }

        let (node, sym, val) = self.decode_value(ctx, field, rd)?;
        let c = &mut self.ctxs[ctx];
        c.vals.insert(field.id.clone(), val.clone());
        c.last = Some(val);
        c.strukt.push(field.id.clone(), node, sym);
        Ok(())
    }

    /// Decodes one array-valued field. Switch resolution happens per
    /// element, inside [Decoder::decode_value], and every mode updates the
    /// enclosing context's most recent value per element.
    fn decode_repeat(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        rd: &mut Reader<'a>,
    ) -> Result<(Node, Value), DecodeError> {
        let mut nodes = Vec::new();
        let mut vals = Vec::new();

        match &field.repeat {
            Repeat::None => {}
            Repeat::Eos => {
                while !rd.is_end() {
                    let (node, _, val) = self.decode_value(ctx, field, rd)?;
                    nodes.push(node);
                    self.ctxs[ctx].last = Some(val.clone());
                    vals.push(val);
                }
            }
            Repeat::Count(e) => {
                // evaluated once, before the loop; zero is a valid count
                let n = self.eval_len(ctx, rd, &field.id, "repeat-expr", e)?;
                for _ in 0..n {
                    let (node, _, val) = self.decode_value(ctx, field, rd)?;
                    nodes.push(node);
                    self.ctxs[ctx].last = Some(val.clone());
                    vals.push(val);
                }
            }
            Repeat::Until(e) => loop {
                let (node, _, val) = self.decode_value(ctx, field, rd)?;
                nodes.push(node);
                self.ctxs[ctx].last = Some(val.clone());
                vals.push(val);
                if self.eval_bool(ctx, rd, &field.id, "repeat-until", e)? {
                    break;
                }
            },
        }

        Ok((Node::Array(nodes), Value::Array(vals)))
    }

    /// Decodes one value: resolves the type (running the switch if there is
    /// one), dispatches to a built-in or user type and applies the enum
    /// symbol overlay. Returns the tree node, the enum symbol and the
    /// expression-language view of the value.
    fn decode_value(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        rd: &mut Reader<'a>,
    ) -> Result<(Node, Option<String>, Value), DecodeError> {
        if let Some(expected) = &field.contents {
            rd.align_to_byte();
            let actual = rd.read_bytes(expected.len())?;
            if &actual != expected {
                return Err(DecodeError::ContentsMismatch {
                    field: field.id.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
            let val = bytes_value(&actual);
            return Ok((Node::Bytes(actual), None, val));
        }

        let name = match &field.type_ref {
            None => "bytes".to_string(),
            Some(TypeRef::Name(n)) => n.clone(),
            Some(TypeRef::Switch { on, cases, default }) => {
                let disc = self.eval(ctx, rd, &field.id, "switch-on", on)?;
                let mut chosen = None;
                for case in cases {
                    let key = self.eval(ctx, rd, &field.id, "case", &case.key)?;
                    if value_eq(&key, &disc).unwrap_or(false) {
                        chosen = Some(case.type_name.clone());
                        break;
                    }
                }
                match chosen.or_else(|| default.clone()) {
                    Some(n) => n,
                    None => {
                        return Err(DecodeError::UnmatchedSwitch {
                            field: field.id.clone(),
                            value: disc.to_string(),
                        });
                    }
                }
            }
        };

        if let Some(b) = builtin::lookup(&name) {
            return self.decode_builtin(ctx, field, rd, b);
        }
        let Some(tspec) = self.find_type(ctx, &name) else {
            return Err(DecodeError::UnknownType {
                field: field.id.clone(),
                name,
            });
        };
        self.decode_user(ctx, field, tspec, rd)
    }

    fn decode_builtin(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        rd: &mut Reader<'a>,
        b: Builtin,
    ) -> Result<(Node, Option<String>, Value), DecodeError> {
        if b.byte_align {
            rd.align_to_byte();
        }
        let order = rd.endian.with_hint(b.endian);
        let bit_order = rd.bit_endian.with_hint(b.endian);

        let (node, val) = match b.encoding {
            Encoding::Bytes => {
                let n = self.byte_len(ctx, field, rd)?;
                let bs = rd.read_bytes(n)?;
                let val = bytes_value(&bs);
                (Node::Bytes(bs), val)
            }
            Encoding::Str => {
                let n = self.byte_len(ctx, field, rd)?;
                let s = rd.read_utf8(n)?;
                (Node::Str(s.clone()), Value::Str(s))
            }
            Encoding::StrTerminated => {
                // an explicit size frames the string; the whole frame is
                // consumed regardless of where the terminator sits
                let s = if let Some(size) = &field.size {
                    let n = self.eval_len(ctx, rd, &field.id, "size", size)?;
                    let start = rd.pos();
                    let mut sub = rd.view(start, start + n * 8);
                    let s = sub.read_utf8_z()?;
                    rd.skip(n * 8)?;
                    s
                } else {
                    rd.read_utf8_z()?
                };
                (Node::Str(s.clone()), Value::Str(s))
            }
            Encoding::Bool => {
                let v = rd.read_bool(bit_order)?;
                (Node::Bool(v), Value::Bool(v))
            }
            Encoding::Bits => {
                let v = rd.read_bitfield(b.bit_size, bit_order)?;
                (Node::UInt(v), Value::from_u64(v))
            }
            Encoding::Unsigned => {
                let v = rd.read_uint(b.bit_size, order)?;
                (Node::UInt(v), Value::from_u64(v))
            }
            Encoding::Signed => {
                let v = rd.read_sint(b.bit_size, order)?;
                (Node::SInt(v), Value::Int(v))
            }
            Encoding::Float => {
                let v = if b.bit_size == 32 {
                    rd.read_f32(order)? as f64
                } else {
                    rd.read_f64(order)?
                };
                (Node::Float(v), Value::Float(v))
            }
        };

        let sym = match &field.enum_name {
            Some(en) => self
                .find_enum(ctx, en)
                .and_then(|e| e.sym_for(&val))
                .map(str::to_string),
            None => None,
        };
        Ok((node, sym, val))
    }

    fn decode_user(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        tspec: &'s TypeSpec,
        rd: &mut Reader<'a>,
    ) -> Result<(Node, Option<String>, Value), DecodeError> {
        rd.align_to_byte();

        let child;
        if field.size.is_some() || field.size_eos {
            // framed: the subtype gets its own bounded stream and the full
            // declared extent is consumed whether or not it read everything
            let start = rd.pos();
            let end = match &field.size {
                Some(size) => {
                    let n = self.eval_len(ctx, rd, &field.id, "size", size)?;
                    start + n * 8
                }
                None => rd.region().1,
            };
            let mut sub = rd.view(start, end);
            if let Some(e) = tspec.endian {
                sub.endian = e;
            }
            if let Some(e) = tspec.bit_endian {
                sub.bit_endian = e;
            }
            child = self.push_ctx(tspec, Some(ctx), sub.region(), sub.endian, sub.bit_endian);
            self.decode_struct(child, &mut sub)?;
            rd.skip(end - start)?;
        } else {
            // unframed: the subtype shares this stream; its meta endianness
            // applies for its own fields only
            let saved = (rd.endian, rd.bit_endian);
            if let Some(e) = tspec.endian {
                rd.endian = e;
            }
            if let Some(e) = tspec.bit_endian {
                rd.bit_endian = e;
            }
            child = self.push_ctx(tspec, Some(ctx), rd.region(), rd.endian, rd.bit_endian);
            let res = self.decode_struct(child, rd);
            rd.endian = saved.0;
            rd.bit_endian = saved.1;
            res?;
        }

        let node = Node::Struct(self.ctxs[child].strukt.clone());
        Ok((node, None, Value::Scope(ScopeRef(child))))
    }

    /// Resolves an instance at most once: a cached value is returned as is,
    /// a marker catches self-dependency, and a fresh resolution also lands
    /// in the output tree.
    fn resolve_instance(
        &mut self,
        ctx: usize,
        name: &str,
        rd: &Reader<'a>,
    ) -> Result<Value, DecodeError> {
        match self.ctxs[ctx].instances.get(name) {
            Some(InstanceSlot::Done(v)) => return Ok(v.clone()),
            Some(InstanceSlot::Resolving) => {
                return Err(DecodeError::InstanceCycle(name.to_string()));
            }
            None => {}
        }
        let spec = self.ctxs[ctx].spec;
        let Some(ispec) = spec.instances.get(name) else {
            return Err(DecodeError::UnknownInstance(name.to_string()));
        };
        self.ctxs[ctx]
            .instances
            .insert(name.to_string(), InstanceSlot::Resolving);

        let (node, sym, val) = self.decode_instance(ctx, ispec, rd)?;
        self.ctxs[ctx]
            .instances
            .insert(name.to_string(), InstanceSlot::Done(val.clone()));
        if let Some(node) = node {
            self.ctxs[ctx].strukt.push(name.to_string(), node, sym);
        }
        Ok(val)
    }

    fn decode_instance(
        &mut self,
        ctx: usize,
        ispec: &'s TypeSpec,
        rd: &Reader<'a>,
    ) -> Result<(Option<Node>, Option<String>, Value), DecodeError> {
        if let Some(value) = &ispec.value {
            let v = self.eval(ctx, rd, &ispec.id, "value", value)?;
            let sym = match &ispec.enum_name {
                Some(en) => self
                    .find_enum(ctx, en)
                    .and_then(|e| e.sym_for(&v))
                    .map(str::to_string),
                None => None,
            };
            // scope-valued results have no tree form and stay lookup-only
            return Ok((Node::from_value(&v), sym, v));
        }

        let Some(pos) = &ispec.pos else {
            return Err(DecodeError::UnknownInstance(ispec.id.clone()));
        };
        let p = self.eval_len(ctx, rd, &ispec.id, "pos", pos)?;

        // fresh view over the owning context's stream, at its snapshot
        // endianness; the live cursor is untouched
        let (start, end) = self.ctxs[ctx].region;
        let mut base = Reader::new(self.data);
        base.endian = self.ctxs[ctx].endian;
        base.bit_endian = self.ctxs[ctx].bit_endian;
        let mut sub = base.view(start + p * 8, end);

        if ispec.repeat != Repeat::None {
            let (node, val) = self.decode_repeat(ctx, ispec, &mut sub)?;
            return Ok((Some(node), None, val));
        }
        let (node, sym, val) = self.decode_value(ctx, ispec, &mut sub)?;
        Ok((Some(node), sym, val))
    }

    /// Byte length of an externally sized read: `size`, or the rest of the
    /// region for `size-eos`.
    fn byte_len(
        &mut self,
        ctx: usize,
        field: &'s TypeSpec,
        rd: &Reader<'a>,
    ) -> Result<usize, DecodeError> {
        if let Some(size) = &field.size {
            return self.eval_len(ctx, rd, &field.id, "size", size);
        }
        if field.size_eos {
            return Ok(rd.bits_left() / 8);
        }
        Err(DecodeError::MissingSize {
            field: field.id.clone(),
        })
    }

    fn eval(
        &mut self,
        ctx: usize,
        rd: &Reader<'a>,
        field: &str,
        role: &'static str,
        e: &Expr,
    ) -> Result<Value, DecodeError> {
        let mut host = Host { dec: self, ctx, rd };
        e.eval(&mut host).map_err(|err| DecodeError::Eval {
            field: field.to_string(),
            role,
            text: e.text.clone(),
            err,
        })
    }

    fn eval_bool(
        &mut self,
        ctx: usize,
        rd: &Reader<'a>,
        field: &str,
        role: &'static str,
        e: &Expr,
    ) -> Result<bool, DecodeError> {
        self.eval(ctx, rd, field, role, e)?
            .as_bool()
            .ok_or_else(|| DecodeError::ExprType {
                field: field.to_string(),
                role,
                text: e.text.clone(),
                expected: "a boolean",
            })
    }

    fn eval_len(
        &mut self,
        ctx: usize,
        rd: &Reader<'a>,
        field: &str,
        role: &'static str,
        e: &Expr,
    ) -> Result<usize, DecodeError> {
        let wrong = || DecodeError::ExprType {
            field: field.to_string(),
            role,
            text: e.text.clone(),
            expected: "a non-negative integer",
        };
        let v = self.eval(ctx, rd, field, role, e)?;
        let n = v.as_int().ok_or_else(wrong)?;
        usize::try_from(n).map_err(|_| wrong())
    }
}

fn bytes_value(bs: &[u8]) -> Value {
    Value::Array(bs.iter().map(|&b| Value::Int(b as i64)).collect())
}

/// The identifier resolver expressions evaluate against: built-in names
/// first, then decoded fields of the target context, then its instances.
struct Host<'h, 's, 'a> {
    dec: &'h mut Decoder<'s, 'a>,
    ctx: usize,
    rd: &'h Reader<'a>,
}

impl Resolve for Host<'_, '_, '_> {
    fn resolve(
        &mut self,
        scope: Option<ScopeRef>,
        ns: Option<&str>,
        name: &str,
    ) -> Result<Value, EvalError> {
        let ctx = scope.map_or(self.ctx, |s| s.0);

        if let Some(ns) = ns {
            let e = self
                .dec
                .find_enum(ctx, ns)
                .ok_or_else(|| EvalError::Resolve(format!("failed to lookup enum {}", ns)))?;
            return e
                .value_of(name)
                .cloned()
                .ok_or_else(|| EvalError::Resolve(format!("failed to lookup {}::{}", ns, name)));
        }

        match name {
            "_" => {
                return self.dec.ctxs[ctx]
                    .last
                    .clone()
                    .ok_or_else(|| EvalError::Resolve("no last decoded value".to_string()));
            }
            "_root" => return Ok(Value::Scope(ScopeRef(0))),
            "_parent" => {
                return self.dec.ctxs[ctx]
                    .parent
                    .map(|p| Value::Scope(ScopeRef(p)))
                    .ok_or_else(|| EvalError::Resolve("no parent context".to_string()));
            }
            "_io" => return Ok(Value::Scope(ScopeRef(ctx))),
            "eof" if scope.is_none() => return Ok(Value::Bool(self.rd.is_end())),
            _ => {}
        }

        if let Some(v) = self.dec.ctxs[ctx].vals.get(name) {
            return Ok(v.clone());
        }
        if self.dec.ctxs[ctx].spec.instances.contains_key(name) {
            return self
                .dec
                .resolve_instance(ctx, name, self.rd)
                .map_err(|err| match err {
                    DecodeError::InstanceCycle(n) => {
                        EvalError::Resolve(format!("instance {} depends on itself", n))
                    }
                    other => EvalError::Resolve(other.to_string()),
                });
        }
        Err(EvalError::Resolve(format!(
            "failed to lookup ident {}",
            name
        )))
    }
}
