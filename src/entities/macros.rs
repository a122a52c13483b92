//! Macros for reducing boilerplate when defining entities

/// Implement [`Entity`](crate::core::entity::Entity) for a struct with an
/// `id: Uuid` field
///
/// The optional block holds overrides of the trait's provided items.
///
/// # Example
/// ```rust,ignore
/// impl_entity!(Booking, "booking", "bookings", {
///     fn required_fields() -> &'static [(&'static str, &'static str)] {
///         &[("tour", "Booking must belong to a Tour!")]
///     }
/// });
/// ```
#[macro_export]
macro_rules! impl_entity {
    ($type:ident, $singular:literal, $plural:literal) => {
        $crate::impl_entity!($type, $singular, $plural, {});
    };
    ($type:ident, $singular:literal, $plural:literal, { $($body:tt)* }) => {
        impl $crate::core::entity::Entity for $type {
            fn resource_name() -> &'static str {
                $plural
            }

            fn resource_name_singular() -> &'static str {
                $singular
            }

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            $($body)*
        }
    };
}
