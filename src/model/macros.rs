//! Declarative definition of typed models.

/// Declares a typed model and implements [`Entity`](crate::model::Entity) for it.
///
/// The struct gets a hidden [`EntityBase`](crate::model::EntityBase) next to the
/// declared fields. Every field type must implement `Default`, `Clone`,
/// `Debug`, `Serialize` and `DeserializeOwned`. The type name is the struct
/// name. Field names must not collide with `id`, `created_at`, `updated_at`
/// or `__class__`.
///
/// Reconstruction decodes each declared field (missing ones take their
/// default) and rejects records carrying undeclared fields.
///
/// ```
/// use modelstore::model;
/// use modelstore::model::Entity;
///
/// model! {
///     pub struct Widget {
///         pub name: String,
///         pub count: i64,
///     }
/// }
///
/// let widget = Widget::new("gear".to_string(), 3);
/// let record = widget.to_record().unwrap();
/// assert_eq!(record.class_name(), Some("Widget"));
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            __base: $crate::model::EntityBase,
            $( $(#[$field_meta])* $field_vis $field: $field_ty, )*
        }

        impl $name {
            /// Creates a fresh entity holding the given field values.
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: $field_ty),*) -> Self {
                Self {
                    __base: $crate::model::EntityBase::new(),
                    $( $field, )*
                }
            }
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                <Self as $crate::model::Entity>::fresh()
            }
        }

        impl $crate::model::Entity for $name {
            fn entity_type_name() -> &'static str {
                stringify!($name)
            }

            fn fresh() -> Self {
                Self {
                    __base: $crate::model::EntityBase::new(),
                    $( $field: ::core::default::Default::default(), )*
                }
            }

            fn from_record(record: &$crate::core::Record) -> $crate::core::Result<Self> {
                record.ensure_known_fields(stringify!($name), &[$(stringify!($field)),*])?;
                let __base = $crate::model::EntityBase::from_record(record)?;
                Ok(Self {
                    __base,
                    $(
                        $field: record
                            .decode_field::<$field_ty>(stringify!($field))?
                            .unwrap_or_default(),
                    )*
                })
            }

            fn base(&self) -> &$crate::model::EntityBase {
                &self.__base
            }

            fn base_mut(&mut self) -> &mut $crate::model::EntityBase {
                &mut self.__base
            }

            fn fields(
                &self,
            ) -> $crate::core::Result<$crate::serde_json::Map<String, $crate::serde_json::Value>> {
                #[allow(unused_mut)]
                let mut fields = $crate::serde_json::Map::new();
                $(
                    fields.insert(
                        stringify!($field).to_string(),
                        $crate::serde_json::to_value(&self.$field)?,
                    );
                )*
                Ok(fields)
            }
        }
    };
}
