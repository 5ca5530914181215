//! Purpose: Resolve and cache the per-type metadata that maps HAL documents onto structs.
//! Exports: `HalResource`, `TypeDescriptor`, `DescriptorBuilder`, `PropertyBinding`,
//! `EmbeddedBinding`, `Shape`, `resolve`.
//! Role: Registration-based descriptor table; stands in for runtime reflection.
//! Invariants: One descriptor per `TypeId`, immutable once built, shared via `Arc`.
//! Invariants: Racing constructions for the same type are equivalent; last writer wins.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::document;
use crate::core::error::{Error, ErrorKind};

pub(crate) type DecodeValueFn = Box<dyn Fn(&Value) -> Result<Box<dyn Any>, Error> + Send + Sync>;
pub(crate) type DecodeListFn =
    Box<dyn Fn(&[&Value]) -> Result<Box<dyn Any>, Error> + Send + Sync>;
pub(crate) type WriteFn =
    Box<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), Error> + Send + Sync>;
pub(crate) type ConstructFn = Box<dyn Fn() -> Result<Box<dyn Any>, Error> + Send + Sync>;

/// A type that can be decoded from a HAL document.
///
/// `descriptor()` declares the type's bindings once; the registry caches the
/// result for the life of the process.
pub trait HalResource: Sized + 'static {
    fn descriptor() -> TypeDescriptor;
}

/// How an embedded relation maps onto the target field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shape {
    Scalar,
    Array,
    Collection,
}

pub struct PropertyBinding {
    key: &'static str,
    decode: DecodeValueFn,
    write: Option<WriteFn>,
}

impl PropertyBinding {
    /// Declares a property without a writer. Decoding the key succeeds, but
    /// building an instance from it fails with `PropertyWrite`.
    pub fn declare<V: DeserializeOwned + 'static>(key: &'static str) -> Self {
        Self {
            key,
            decode: decode_with_serde::<V>(key),
            write: None,
        }
    }

    pub fn with_writer<T, V, F>(mut self, write: F) -> Self
    where
        T: 'static,
        V: 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.write = Some(erase_writer(self.key, write));
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub(crate) fn decode(&self, raw: &Value) -> Result<Box<dyn Any>, Error> {
        (self.decode)(raw)
    }

    pub(crate) fn write(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> Result<(), Error> {
        match &self.write {
            Some(write) => write(instance, value),
            None => Err(Error::new(ErrorKind::PropertyWrite)
                .with_message("binding has no writer")
                .with_key(self.key)),
        }
    }
}

pub struct EmbeddedBinding {
    relation: &'static str,
    shape: Shape,
    scalar: Option<DecodeValueFn>,
    element: Option<DecodeListFn>,
    write: Option<WriteFn>,
}

impl EmbeddedBinding {
    pub fn scalar<R: HalResource>(relation: &'static str) -> Self {
        Self {
            relation,
            shape: Shape::Scalar,
            scalar: Some(Box::new(move |raw| {
                document::decode_value::<R>(raw).map(|resource| Box::new(resource) as Box<dyn Any>)
            })),
            element: None,
            write: None,
        }
    }

    /// A collection relation with no element type yet. Decoding a document
    /// that presents the relation fails with `MissingElementType` until
    /// `with_element` names one.
    pub fn collection(relation: &'static str) -> Self {
        Self {
            relation,
            shape: Shape::Collection,
            scalar: None,
            element: None,
            write: None,
        }
    }

    /// An array relation with no element type yet; same deferral as
    /// `collection`.
    pub fn array(relation: &'static str) -> Self {
        Self {
            relation,
            shape: Shape::Array,
            scalar: None,
            element: None,
            write: None,
        }
    }

    pub fn with_element<R: HalResource>(mut self) -> Self {
        self.element = match self.shape {
            Shape::Collection => Some(decode_elements_vec::<R>()),
            Shape::Array => Some(decode_elements_array::<R>()),
            Shape::Scalar => None,
        };
        self
    }

    pub fn with_writer<T, V, F>(mut self, write: F) -> Self
    where
        T: 'static,
        V: 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.write = Some(erase_writer(self.relation, write));
        self
    }

    pub fn relation(&self) -> &'static str {
        self.relation
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn has_element(&self) -> bool {
        self.element.is_some()
    }

    pub(crate) fn scalar_codec(&self) -> Option<&DecodeValueFn> {
        self.scalar.as_ref()
    }

    pub(crate) fn element_codec(&self) -> Option<&DecodeListFn> {
        self.element.as_ref()
    }

    pub(crate) fn write(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> Result<(), Error> {
        match &self.write {
            Some(write) => write(instance, value),
            None => Err(Error::new(ErrorKind::PropertyWrite)
                .with_message("binding has no writer")
                .with_key(self.relation)),
        }
    }
}

pub struct TypeDescriptor {
    type_name: &'static str,
    type_id: TypeId,
    properties: BTreeMap<&'static str, PropertyBinding>,
    embedded: BTreeMap<&'static str, EmbeddedBinding>,
    ignore_unknown: bool,
    construct: ConstructFn,
}

impl TypeDescriptor {
    pub fn builder<T: HalResource + Default>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn ignore_unknown(&self) -> bool {
        self.ignore_unknown
    }

    pub fn property(&self, key: &str) -> Option<&PropertyBinding> {
        self.properties.get(key)
    }

    pub fn embedded(&self, relation: &str) -> Option<&EmbeddedBinding> {
        self.embedded.get(relation)
    }

    pub fn property_keys(&self) -> Vec<&'static str> {
        self.properties.keys().copied().collect()
    }

    pub fn relation_names(&self) -> Vec<&'static str> {
        self.embedded.keys().copied().collect()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn construct(&self) -> Result<Box<dyn Any>, Error> {
        (self.construct)()
    }
}

pub struct DescriptorBuilder<T> {
    properties: BTreeMap<&'static str, PropertyBinding>,
    embedded: BTreeMap<&'static str, EmbeddedBinding>,
    ignore_unknown: bool,
    construct: ConstructFn,
    _marker: PhantomData<fn() -> T>,
}

impl<T: HalResource> DescriptorBuilder<T> {
    pub fn new() -> Self
    where
        T: Default,
    {
        Self::with_constructor(|| Ok(T::default()))
    }

    /// For types without a usable `Default`. A constructor that fails surfaces
    /// as `Instantiation` on every decode of this type.
    pub fn with_constructor<C>(construct: C) -> Self
    where
        C: Fn() -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            properties: BTreeMap::new(),
            embedded: BTreeMap::new(),
            ignore_unknown: false,
            construct: Box::new(move || {
                construct().map(|instance| Box::new(instance) as Box<dyn Any>)
            }),
            _marker: PhantomData,
        }
    }

    /// Unknown top-level keys and embedded relations are dropped instead of
    /// failing the decode.
    pub fn ignore_unknown(mut self) -> Self {
        self.ignore_unknown = true;
        self
    }

    pub fn property<V, F>(self, key: &'static str, write: F) -> Self
    where
        V: DeserializeOwned + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.bind_property(PropertyBinding::declare::<V>(key).with_writer(write))
    }

    pub fn embedded<R, F>(self, relation: &'static str, write: F) -> Self
    where
        R: HalResource,
        F: Fn(&mut T, R) + Send + Sync + 'static,
    {
        self.bind_embedded(EmbeddedBinding::scalar::<R>(relation).with_writer(write))
    }

    pub fn embedded_vec<R, F>(self, relation: &'static str, write: F) -> Self
    where
        R: HalResource,
        F: Fn(&mut T, Vec<R>) + Send + Sync + 'static,
    {
        self.bind_embedded(
            EmbeddedBinding::collection(relation)
                .with_element::<R>()
                .with_writer(write),
        )
    }

    pub fn embedded_array<R, F>(self, relation: &'static str, write: F) -> Self
    where
        R: HalResource,
        F: Fn(&mut T, Box<[R]>) + Send + Sync + 'static,
    {
        self.bind_embedded(
            EmbeddedBinding::array(relation)
                .with_element::<R>()
                .with_writer(write),
        )
    }

    pub fn bind_property(mut self, binding: PropertyBinding) -> Self {
        self.properties.insert(binding.key(), binding);
        self
    }

    pub fn bind_embedded(mut self, binding: EmbeddedBinding) -> Self {
        self.embedded.insert(binding.relation(), binding);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            properties: self.properties,
            embedded: self.embedded,
            ignore_unknown: self.ignore_unknown,
            construct: self.construct,
        }
    }
}

static DESCRIPTORS: OnceLock<RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>> = OnceLock::new();

/// Returns the cached descriptor for `T`, building it on first use.
pub fn resolve<T: HalResource>() -> Arc<TypeDescriptor> {
    let cache = DESCRIPTORS.get_or_init(|| RwLock::new(HashMap::new()));
    let type_id = TypeId::of::<T>();
    {
        let map = cache.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(descriptor) = map.get(&type_id) {
            return Arc::clone(descriptor);
        }
    }

    let descriptor = Arc::new(T::descriptor());
    tracing::debug!(type_name = descriptor.type_name(), "resolved type descriptor");
    let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
    map.insert(type_id, Arc::clone(&descriptor));
    descriptor
}

fn decode_with_serde<V: DeserializeOwned + 'static>(key: &'static str) -> DecodeValueFn {
    Box::new(move |raw| {
        serde_json::from_value::<V>(raw.clone())
            .map(|value| Box::new(value) as Box<dyn Any>)
            .map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message("failed to decode property value")
                    .with_key(key)
                    .with_source(err)
            })
    })
}

fn decode_elements_vec<R: HalResource>() -> DecodeListFn {
    Box::new(move |items| {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(document::decode_value::<R>(item)?);
        }
        Ok(Box::new(out) as Box<dyn Any>)
    })
}

fn decode_elements_array<R: HalResource>() -> DecodeListFn {
    Box::new(move |items| {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(document::decode_value::<R>(item)?);
        }
        Ok(Box::new(out.into_boxed_slice()) as Box<dyn Any>)
    })
}

fn erase_writer<T, V, F>(key: &'static str, write: F) -> WriteFn
where
    T: 'static,
    V: 'static,
    F: Fn(&mut T, V) + Send + Sync + 'static,
{
    Box::new(move |instance, value| {
        let Some(instance) = instance.downcast_mut::<T>() else {
            return Err(Error::new(ErrorKind::PropertyWrite)
                .with_message("instance type mismatch")
                .with_key(key));
        };
        let value = value.downcast::<V>().map_err(|_| {
            Error::new(ErrorKind::PropertyWrite)
                .with_message("decoded value type mismatch")
                .with_key(key)
        })?;
        write(instance, *value);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::{DescriptorBuilder, HalResource, Shape, TypeDescriptor, resolve};
    use std::sync::Arc;

    #[derive(Debug, Default, PartialEq)]
    struct Widget {
        label: String,
        parts: Vec<Part>,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Part {
        code: String,
    }

    impl HalResource for Widget {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Widget>()
                .property::<String, _>("label", |widget, value| widget.label = value)
                .embedded_vec::<Part, _>("parts", |widget, value| widget.parts = value)
                .build()
        }
    }

    impl HalResource for Part {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Part>()
                .property::<String, _>("code", |part, value| part.code = value)
                .build()
        }
    }

    #[test]
    fn resolve_caches_by_type() {
        let first = resolve::<Widget>();
        let second = resolve::<Widget>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.property_keys(), vec!["label"]);
        assert_eq!(first.relation_names(), vec!["parts"]);
    }

    #[test]
    fn resolve_is_stable_across_threads() {
        #[derive(Debug, Default)]
        struct Gadget {
            serial: u64,
        }

        impl HalResource for Gadget {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::builder::<Gadget>()
                    .property::<u64, _>("serial", |gadget, value| gadget.serial = value)
                    .build()
            }
        }

        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| resolve::<Gadget>().property_keys()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("thread"), vec!["serial"]);
        }
    }

    #[test]
    fn builder_records_shapes_and_flags() {
        let descriptor = Widget::descriptor();
        assert!(!descriptor.ignore_unknown());
        let binding = descriptor.embedded("parts").expect("parts binding");
        assert_eq!(binding.shape(), Shape::Collection);
        assert!(binding.has_element());

        let relaxed = DescriptorBuilder::<Widget>::new().ignore_unknown().build();
        assert!(relaxed.ignore_unknown());
    }
}
