use crate::attr::{ColumnAttr, EntityAttr, snake_case};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitStr, Type};

///
/// MappedField
///

struct MappedField {
    ident: Ident,
    ty: Type,
    attr: ColumnAttr,
}

// derive_entity
pub fn derive_entity(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> Result<TokenStream, Error> {
    let input: DeriveInput = syn::parse2(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = named_fields(&input)?;
    let entity = EntityAttr::parse(&input.attrs)?;

    let entity_name = ident.to_string();
    let column_family = entity
        .column_family
        .unwrap_or_else(|| LitStr::new(&snake_case(&entity_name), ident.span()));
    let keyspace = entity.keyspace.map(|ks| quote!(.keyspace(#ks)));

    let mapped: Vec<&MappedField> = fields.iter().filter(|f| !f.attr.skip).collect();

    let field_models = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let ty = &field.ty;
        let column = field.attr.name.as_ref().map(|n| quote!(.column(#n)));
        let key = field.attr.key.then(|| quote!(.primary_key()));
        let index = field.attr.index.then(|| quote!(.indexed()));

        quote! {
            .field(
                ::widedb::model::FieldModel::of::<#ty>(#name)
                #column #key #index
            )
        }
    });

    let value_arms = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let field_ident = &field.ident;

        quote! {
            #name => Some(::widedb::traits::FieldValue::to_value(&self.#field_ident)),
        }
    });

    let row_fields = fields.iter().map(|field| {
        let name = field.ident.to_string();
        let field_ident = &field.ident;

        if field.attr.skip {
            quote!(#field_ident: ::core::default::Default::default())
        } else {
            quote!(#field_ident: row.read(#name)?)
        }
    });

    Ok(quote! {
        impl #impl_generics ::widedb::traits::EntitySchema for #ident #ty_generics #where_clause {
            const ENTITY_NAME: &'static str = #entity_name;

            fn model() -> ::widedb::model::EntityModel {
                ::widedb::model::EntityModel::new(Self::ENTITY_NAME, #column_family)
                    #keyspace
                    #(#field_models)*
            }
        }

        impl #impl_generics ::widedb::traits::FieldValues for #ident #ty_generics #where_clause {
            fn get_value(&self, field: &str) -> Option<::widedb::value::Value> {
                match field {
                    #(#value_arms)*
                    _ => None,
                }
            }
        }

        impl #impl_generics ::widedb::traits::EntityValue for #ident #ty_generics #where_clause {
            fn from_row(
                row: &::widedb::db::RowReader<'_>,
            ) -> Result<Self, ::widedb::db::ReadError> {
                Ok(Self {
                    #(#row_fields,)*
                })
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> Result<Vec<MappedField>, Error> {
    let message = "Entity can only be derived for structs with named fields";

    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, message));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(&data.fields, message));
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            return Err(Error::new_spanned(field, message));
        };
        fields.push(MappedField {
            ident,
            ty: field.ty.clone(),
            attr: ColumnAttr::parse(field)?,
        });
    }

    // exactly one key field
    let mut keys = fields.iter().filter(|f| f.attr.key);
    let first = keys.next().map(|f| f.ident.clone());
    let second = keys.next().map(|f| f.ident.clone());

    match (first, second) {
        (None, _) => Err(Error::new_spanned(
            &input.ident,
            "an entity needs exactly one `#[column(key)]` field",
        )),
        (Some(_), Some(second)) => Err(Error::new_spanned(
            second,
            "an entity cannot have more than one `#[column(key)]` field",
        )),
        (Some(_), None) => Ok(fields),
    }
}
