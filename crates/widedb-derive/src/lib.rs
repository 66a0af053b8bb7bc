use proc_macro::TokenStream;

mod attr;
mod entity;
mod field_enum;

/// Map a struct with named fields to a column family.
///
/// ```ignore
/// #[derive(Entity)]
/// #[entity(column_family = "users", keyspace = "app")]
/// struct User {
///     #[column(key)]
///     id: String,
///     #[column(index)]
///     age: i32,
///     #[column(name = "nick")]
///     nickname: Option<String>,
///     #[column(skip)]
///     cached: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input.into()).into()
}

/// Store a unit-only enum as its variant name in a text column.
#[proc_macro_derive(FieldEnum, attributes(field_enum))]
pub fn derive_field_enum(input: TokenStream) -> TokenStream {
    field_enum::derive_field_enum(input.into()).into()
}
