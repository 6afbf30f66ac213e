//! Record codec: the opaque node + pluggable serializer contract,
//! together with the full node-kind enumeration (a codec that only
//! knew about one node kind could not serialize a real resource) and
//! two reference codec implementations.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::config::ResourceConfiguration;
use crate::dewey::DeweyId;
use crate::error::{PageError, Result};
use crate::reference::PageReadTrx;
use crate::varint::{read_varlong, write_varlong};

/// The fixed node-kind enumeration: a tagged variant over a closed set
/// rather than an open class hierarchy, so dispatch stays a `match`
/// instead of downcasting through a chain of node types. Covers
/// Sirix's XML and JSON node kinds so a codec has something real to
/// dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Document = 0,
    Element = 1,
    Attribute = 2,
    Namespace = 3,
    Text = 4,
    Comment = 5,
    ProcessingInstruction = 6,
    Object = 7,
    ObjectKey = 8,
    Array = 9,
    NumberValue = 10,
    StringValue = 11,
    BooleanValue = 12,
    NullValue = 13,
}

impl NodeKind {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => NodeKind::Document,
            1 => NodeKind::Element,
            2 => NodeKind::Attribute,
            3 => NodeKind::Namespace,
            4 => NodeKind::Text,
            5 => NodeKind::Comment,
            6 => NodeKind::ProcessingInstruction,
            7 => NodeKind::Object,
            8 => NodeKind::ObjectKey,
            9 => NodeKind::Array,
            10 => NodeKind::NumberValue,
            11 => NodeKind::StringValue,
            12 => NodeKind::BooleanValue,
            13 => NodeKind::NullValue,
            other => {
                return Err(PageError::Format {
                    detail: format!("unknown node-kind tag {other}"),
                })
            }
        })
    }
}

/// An opaque unit of user data: a stable `node_key`, an optional
/// `dewey_id`, and a `kind` tag. The serialized body is
/// entirely owned by the `RecordSerializer` that produced/consumes it;
/// this layer never inspects it.
pub trait Record: std::fmt::Debug + Send + Sync {
    fn node_key(&self) -> u64;
    fn dewey_id(&self) -> Option<&DeweyId>;
    fn kind(&self) -> NodeKind;

    /// Downcast support for codecs that need their concrete record
    /// type back out of the trait object they were handed.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// The pluggable record serializer/deserializer a key-value page calls
/// through for every record body it stores or reads back.
pub trait RecordSerializer: Send + Sync {
    /// Write the record body to `out`. May consult `ctx` for
    /// name-dictionary-style lookups.
    fn serialize(
        &self,
        out: &mut dyn Write,
        record: &dyn Record,
        ctx: &dyn PageReadTrx,
    ) -> Result<()>;

    /// Read a record body previously written by `serialize`. The
    /// caller supplies `node_key` and `dewey_id` from the page frame;
    /// the codec must treat them as authoritative.
    fn deserialize(
        &self,
        input: &mut dyn Read,
        node_key: u64,
        dewey_id: Option<DeweyId>,
        ctx: &dyn PageReadTrx,
    ) -> Result<Arc<dyn Record>>;

    /// Whether this codec variant supports Dewey-ID prefix compression.
    /// A static, per-codec capability bit, not a runtime type test.
    fn supports_dewey(&self) -> bool {
        false
    }

    fn serialize_dewey_id(
        &self,
        out: &mut dyn Write,
        kind: NodeKind,
        current: &DeweyId,
        previous: Option<&DeweyId>,
        _resource_config: &ResourceConfiguration,
    ) -> Result<()> {
        current.serialize_delta(out, kind as u8, previous)
    }

    fn deserialize_dewey_id(
        &self,
        input: &mut dyn Read,
        previous: Option<&DeweyId>,
        _resource_config: &ResourceConfiguration,
    ) -> Result<Option<DeweyId>> {
        let (id, _tag) = DeweyId::deserialize_delta(input, previous)?;
        Ok(Some(id))
    }
}

/// A minimal `Record` carrying a flat byte payload, for tests and
/// callers that don't need a structured node model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesRecord {
    pub node_key: u64,
    pub dewey_id: Option<DeweyId>,
    pub kind: NodeKind,
    pub payload: Vec<u8>,
}

impl Record for BytesRecord {
    fn node_key(&self) -> u64 {
        self.node_key
    }

    fn dewey_id(&self) -> Option<&DeweyId> {
        self.dewey_id.as_ref()
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Codec for `BytesRecord`: writes a VarLong length followed by the
/// raw payload. Supports Dewey.
#[derive(Debug, Default)]
pub struct BytesRecordCodec;

impl RecordSerializer for BytesRecordCodec {
    fn serialize(
        &self,
        out: &mut dyn Write,
        record: &dyn Record,
        _ctx: &dyn PageReadTrx,
    ) -> Result<()> {
        let any = record
            .as_any()
            .downcast_ref::<BytesRecord>()
            .ok_or_else(|| PageError::Codec("expected BytesRecord".to_string()))?;
        write_varlong(out, any.payload.len() as u64)?;
        out.write_all(&any.payload)?;
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut dyn Read,
        node_key: u64,
        dewey_id: Option<DeweyId>,
        _ctx: &dyn PageReadTrx,
    ) -> Result<Arc<dyn Record>> {
        let len = read_varlong(input)? as usize;
        let mut payload = vec![0u8; len];
        input.read_exact(&mut payload)?;
        Ok(Arc::new(BytesRecord {
            node_key,
            dewey_id,
            kind: NodeKind::Element,
            payload,
        }))
    }

    fn supports_dewey(&self) -> bool {
        true
    }
}

/// A minimal JSON-flavored `Record`: a node kind plus a UTF-8 text
/// value (covers object keys, strings, numbers rendered as text).
/// Grounded in the same "opaque record, pluggable codec" contract as
/// `BytesRecordCodec`; provided so the crate is exercisable against a
/// document-shaped payload without pulling in the (out-of-scope) full
/// JSON node model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRecord {
    pub node_key: u64,
    pub dewey_id: Option<DeweyId>,
    pub kind: NodeKind,
    pub text: String,
}

impl Record for JsonRecord {
    fn node_key(&self) -> u64 {
        self.node_key
    }

    fn dewey_id(&self) -> Option<&DeweyId> {
        self.dewey_id.as_ref()
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Default)]
pub struct JsonRecordCodec;

impl RecordSerializer for JsonRecordCodec {
    fn serialize(
        &self,
        out: &mut dyn Write,
        record: &dyn Record,
        _ctx: &dyn PageReadTrx,
    ) -> Result<()> {
        let any = record
            .as_any()
            .downcast_ref::<JsonRecord>()
            .ok_or_else(|| PageError::Codec("expected JsonRecord".to_string()))?;
        out.write_all(&[any.kind as u8])?;
        let bytes = any.text.as_bytes();
        write_varlong(out, bytes.len() as u64)?;
        out.write_all(bytes)?;
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut dyn Read,
        node_key: u64,
        dewey_id: Option<DeweyId>,
        _ctx: &dyn PageReadTrx,
    ) -> Result<Arc<dyn Record>> {
        let mut tag = [0u8; 1];
        input.read_exact(&mut tag)?;
        let kind = NodeKind::from_tag(tag[0])?;
        let len = read_varlong(input)? as usize;
        let mut buf = vec![0u8; len];
        input.read_exact(&mut buf)?;
        let text = String::from_utf8(buf)
            .map_err(|e| PageError::Codec(format!("invalid utf-8 in JSON record: {e}")))?;
        Ok(Arc::new(JsonRecord {
            node_key,
            dewey_id,
            kind,
            text,
        }))
    }

    fn supports_dewey(&self) -> bool {
        true
    }
}
