//! Structured result output.
//!
//! Analysis results serialize through an [`Emitter`]: a hierarchical
//! start/end protocol of named objects, maps and lists. The emitter is a
//! collaborator supplied by the embedder and passed explicitly into every
//! dump call; kestrel holds no process-wide formatter state. A
//! [`JsonEmitter`] backed by `serde_json` ships with the crate.

use serde_json::{Map, Value};

use crate::Error;

/// The hierarchical emitter protocol.
///
/// `begin_*` opens a named child of the current container; `end_*` closes
/// the innermost open container. `map_entry` is valid inside a map or an
/// object; `list_item` only inside a list. Implementations must reject
/// mismatched begin/end pairs with [`Error::EmitterProtocol`].
pub trait Emitter {
    fn begin_object(&mut self, name: &str) -> Result<(), Error>;
    fn end_object(&mut self) -> Result<(), Error>;

    fn begin_map(&mut self, name: &str) -> Result<(), Error>;
    fn map_entry(&mut self, key: &str, value: &str) -> Result<(), Error>;
    fn end_map(&mut self) -> Result<(), Error>;

    fn begin_list(&mut self, name: &str) -> Result<(), Error>;
    fn list_item(&mut self, value: &str) -> Result<(), Error>;
    fn end_list(&mut self) -> Result<(), Error>;
}

/// Serialization through an externally supplied [`Emitter`].
pub trait Dump {
    fn dump(&self, emitter: &mut dyn Emitter) -> Result<(), Error>;
}

enum Frame {
    Object(String, Map<String, Value>),
    Map(String, Map<String, Value>),
    List(String, Vec<Value>),
}

/// An [`Emitter`] building a `serde_json::Value` tree.
#[derive(Default)]
pub struct JsonEmitter {
    root: Map<String, Value>,
    stack: Vec<Frame>,
}

impl JsonEmitter {
    pub fn new() -> JsonEmitter {
        JsonEmitter {
            root: Map::new(),
            stack: Vec::new(),
        }
    }

    /// The accumulated value. Errors if a container is still open.
    pub fn into_value(self) -> Result<Value, Error> {
        if !self.stack.is_empty() {
            return Err(Error::EmitterProtocol("unclosed container at finish"));
        }
        Ok(Value::Object(self.root))
    }

    fn attach(&mut self, name: String, value: Value) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Frame::Object(_, entries)) | Some(Frame::Map(_, entries)) => {
                entries.insert(name, value);
                Ok(())
            }
            Some(Frame::List(_, _)) => Err(Error::EmitterProtocol(
                "named container inside a list",
            )),
            None => {
                self.root.insert(name, value);
                Ok(())
            }
        }
    }
}

impl Emitter for JsonEmitter {
    fn begin_object(&mut self, name: &str) -> Result<(), Error> {
        self.stack
            .push(Frame::Object(name.to_string(), Map::new()));
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Object(name, entries)) => self.attach(name, Value::Object(entries)),
            Some(frame) => {
                self.stack.push(frame);
                Err(Error::EmitterProtocol("end_object without begin_object"))
            }
            None => Err(Error::EmitterProtocol("end_object without begin_object")),
        }
    }

    fn begin_map(&mut self, name: &str) -> Result<(), Error> {
        self.stack
            .push(Frame::Map(name.to_string(), Map::new()));
        Ok(())
    }

    fn map_entry(&mut self, key: &str, value: &str) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Frame::Map(_, entries)) | Some(Frame::Object(_, entries)) => {
                entries.insert(key.to_string(), Value::String(value.to_string()));
                Ok(())
            }
            Some(Frame::List(_, _)) | None => {
                Err(Error::EmitterProtocol("map_entry outside a map or object"))
            }
        }
    }

    fn end_map(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Map(name, entries)) => self.attach(name, Value::Object(entries)),
            Some(frame) => {
                self.stack.push(frame);
                Err(Error::EmitterProtocol("end_map without begin_map"))
            }
            None => Err(Error::EmitterProtocol("end_map without begin_map")),
        }
    }

    fn begin_list(&mut self, name: &str) -> Result<(), Error> {
        self.stack.push(Frame::List(name.to_string(), Vec::new()));
        Ok(())
    }

    fn list_item(&mut self, value: &str) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Frame::List(_, items)) => {
                items.push(Value::String(value.to_string()));
                Ok(())
            }
            Some(Frame::Object(_, _)) | Some(Frame::Map(_, _)) | None => {
                Err(Error::EmitterProtocol("list_item outside a list"))
            }
        }
    }

    fn end_list(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::List(name, items)) => self.attach(name, Value::Array(items)),
            Some(frame) => {
                self.stack.push(frame);
                Err(Error::EmitterProtocol("end_list without begin_list"))
            }
            None => Err(Error::EmitterProtocol("end_list without begin_list")),
        }
    }
}
