//! Purpose: Construct the target instance and apply parsed values onto it.
//! Exports: `build` (crate-internal).
//! Role: Final stage of the decode pipeline; consumes the parsed document.
//! Invariants: Write failures surface with the offending key; nothing partial escapes.

use std::any::TypeId;

use crate::core::descriptor::{HalResource, TypeDescriptor};
use crate::core::document::ParsedDocument;
use crate::core::error::{Error, ErrorKind};

pub(crate) fn build<T: HalResource>(
    descriptor: &TypeDescriptor,
    parsed: ParsedDocument,
) -> Result<T, Error> {
    if descriptor.type_id() != TypeId::of::<T>() {
        return Err(Error::new(ErrorKind::Instantiation)
            .with_message("descriptor does not describe the requested type")
            .with_type_name(descriptor.type_name()));
    }

    let mut boxed = descriptor.construct()?;
    if !boxed.is::<T>() {
        return Err(Error::new(ErrorKind::Instantiation)
            .with_message("constructor produced a value of an unexpected type")
            .with_type_name(descriptor.type_name()));
    }

    for (key, value) in parsed.properties {
        let Some(binding) = descriptor.property(key) else {
            return Err(Error::new(ErrorKind::PropertyWrite)
                .with_message("no binding for parsed property")
                .with_key(key)
                .with_type_name(descriptor.type_name()));
        };
        binding.write(boxed.as_mut(), value)?;
    }

    for (relation, value) in parsed.embedded {
        let Some(binding) = descriptor.embedded(relation) else {
            return Err(Error::new(ErrorKind::PropertyWrite)
                .with_message("no binding for resolved relation")
                .with_relation(relation)
                .with_type_name(descriptor.type_name()));
        };
        binding.write(boxed.as_mut(), value)?;
    }

    match boxed.downcast::<T>() {
        Ok(instance) => Ok(*instance),
        Err(_) => Err(Error::new(ErrorKind::Instantiation)
            .with_message("constructor produced a value of an unexpected type")
            .with_type_name(descriptor.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use crate::core::descriptor::{
        DescriptorBuilder, HalResource, PropertyBinding, TypeDescriptor,
    };
    use crate::core::document::decode_str;
    use crate::core::error::{Error, ErrorKind};

    #[derive(Debug, Default)]
    struct Sealed {
        label: String,
    }

    impl HalResource for Sealed {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Sealed>()
                .property::<String, _>("label", |sealed, value| sealed.label = value)
                .bind_property(PropertyBinding::declare::<String>("stamp"))
                .build()
        }
    }

    #[derive(Debug)]
    struct NoDefault {
        label: String,
    }

    impl HalResource for NoDefault {
        fn descriptor() -> TypeDescriptor {
            DescriptorBuilder::<NoDefault>::with_constructor(|| {
                Err(Error::new(ErrorKind::Instantiation)
                    .with_message("no viable construction for type"))
            })
            .property::<String, _>("label", |instance, value| instance.label = value)
            .build()
        }
    }

    #[test]
    fn writes_declared_properties() {
        let sealed: Sealed = decode_str(r#"{"label":"ok"}"#).expect("decode");
        assert_eq!(sealed.label, "ok");
    }

    #[test]
    fn writer_less_binding_fails_on_write() {
        let err = decode_str::<Sealed>(r#"{"label":"ok","stamp":"x"}"#).expect_err("no writer");
        assert_eq!(err.kind(), ErrorKind::PropertyWrite);
        assert_eq!(err.key(), Some("stamp"));
    }

    #[test]
    fn failing_constructor_surfaces_as_instantiation() {
        let err = decode_str::<NoDefault>(r#"{"label":"ok"}"#).expect_err("constructor");
        assert_eq!(err.kind(), ErrorKind::Instantiation);
    }
}
