use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, LitStr};

// derive_field_enum
pub fn derive_field_enum(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> Result<TokenStream, Error> {
    let input: DeriveInput = syn::parse2(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data) = &input.data else {
        return Err(Error::new_spanned(
            ident,
            "FieldEnum can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(Error::new_spanned(ident, "FieldEnum needs at least one variant"));
    }

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(
                variant,
                "FieldEnum variants cannot carry data",
            ));
        }
        variants.push((&variant.ident, stored_name(variant)?));
    }

    let to_arms = variants.iter().map(|(variant, name)| {
        quote!(Self::#variant => #name,)
    });
    let from_arms = variants.iter().map(|(variant, name)| {
        quote!(#name => Some(Self::#variant),)
    });

    Ok(quote! {
        impl #impl_generics ::widedb::traits::FieldValue for #ident #ty_generics #where_clause {
            fn to_value(&self) -> ::widedb::value::Value {
                let name = match self {
                    #(#to_arms)*
                };

                ::widedb::value::Value::Text(name.to_string())
            }

            fn from_value(value: &::widedb::value::Value) -> Option<Self> {
                let ::widedb::value::Value::Text(name) = value else {
                    return None;
                };

                match name.as_str() {
                    #(#from_arms)*
                    _ => None,
                }
            }
        }

        impl #impl_generics ::widedb::traits::ColumnValue for #ident #ty_generics #where_clause {
            fn column_type() -> ::widedb::model::ColumnType {
                ::widedb::model::ColumnType::Text
            }
        }
    })
}

// `#[field_enum(rename = "...")]`, else the variant name
fn stored_name(variant: &syn::Variant) -> Result<LitStr, Error> {
    let mut name = LitStr::new(&variant.ident.to_string(), variant.ident.span());

    for attr in variant.attrs.iter().filter(|a| a.path().is_ident("field_enum")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                name = meta.value()?.parse()?;
                Ok(())
            } else {
                Err(meta.error("expected `rename`"))
            }
        })?;
    }

    Ok(name)
}
