//! Operation and status units plus their codec contracts
//!
//! Inbound records decode into `Operation`s through a `Translator` registered
//! for the record's type tag; outbound `Status`es encode through a `Generator`
//! the same way. Payloads are opaque to the router - translators and the
//! application agree on the concrete types behind `dyn Any`.

use std::any::Any;

use super::codec::CodecResult;

/// Opaque application value carried by an operation or status
pub type Payload = Box<dyn Any + Send + Sync>;

/// Decoder bound to a type tag
///
/// Converts the raw bytes following the tag into an application value plus
/// the count of bytes consumed, so records can be packed back-to-back.
pub trait Translator: Send + Sync {
    /// The type tag this translator handles
    fn op_type(&self) -> u32;

    /// Decode the payload from the remaining datagram bytes
    ///
    /// Returns (bytes consumed, decoded value). The slice may extend past
    /// this record; translators must only consume their own payload.
    fn translate(&self, data: &[u8]) -> CodecResult<(usize, Payload)>;
}

/// Encoder bound to a type tag
pub trait Generator: Send + Sync {
    /// The type tag this generator handles
    fn status_type(&self) -> u32;

    /// Encode the application value into payload bytes (tag excluded)
    fn generate(&self, value: &(dyn Any + Send + Sync)) -> CodecResult<Vec<u8>>;
}

/// An incoming decoded unit: type tag plus application value
pub struct Operation {
    op_type: u32,
    value: Payload,
}

impl Operation {
    pub fn new(op_type: u32, value: Payload) -> Self {
        Self { op_type, value }
    }

    pub fn op_type(&self) -> u32 {
        self.op_type
    }

    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }

    /// Borrow the payload as a concrete type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn into_value(self) -> Payload {
        self.value
    }
}

/// An outgoing unit: type tag plus the value a generator will encode
pub struct Status {
    status_type: u32,
    value: Payload,
}

impl Status {
    pub fn new<T: Any + Send + Sync>(status_type: u32, value: T) -> Self {
        Self {
            status_type,
            value: Box::new(value),
        }
    }

    pub fn status_type(&self) -> u32 {
        self.status_type
    }

    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_downcast() {
        let op = Operation::new(3, Box::new(42u32));
        assert_eq!(op.op_type(), 3);
        assert_eq!(op.downcast_ref::<u32>(), Some(&42));
        assert_eq!(op.downcast_ref::<f32>(), None);
    }

    #[test]
    fn test_status_value() {
        let status = Status::new(1, (2.0f32, 3.0f32));
        assert_eq!(status.status_type(), 1);
        let pair = status.value().downcast_ref::<(f32, f32)>().unwrap();
        assert_eq!(*pair, (2.0, 3.0));
    }
}
