use syn::{Attribute, Error, Field, LitStr, spanned::Spanned};

///
/// EntityAttr
/// `#[entity(column_family = "...", keyspace = "...")]`
///

#[derive(Default)]
pub struct EntityAttr {
    pub column_family: Option<LitStr>,
    pub keyspace: Option<LitStr>,
}

impl EntityAttr {
    pub fn parse(attrs: &[Attribute]) -> Result<Self, Error> {
        let mut out = Self::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column_family") {
                    out.column_family = Some(non_empty(meta.value()?.parse()?)?);
                    Ok(())
                } else if meta.path.is_ident("keyspace") {
                    out.keyspace = Some(non_empty(meta.value()?.parse()?)?);
                    Ok(())
                } else {
                    Err(meta.error("expected `column_family` or `keyspace`"))
                }
            })?;
        }

        Ok(out)
    }
}

///
/// ColumnAttr
/// `#[column(name = "...", key, index, skip)]`
///

#[derive(Default)]
pub struct ColumnAttr {
    pub name: Option<LitStr>,
    pub key: bool,
    pub index: bool,
    pub skip: bool,
}

impl ColumnAttr {
    pub fn parse(field: &Field) -> Result<Self, Error> {
        let mut out = Self::default();

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("column")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    out.name = Some(non_empty(meta.value()?.parse()?)?);
                } else if meta.path.is_ident("key") {
                    out.key = true;
                } else if meta.path.is_ident("index") {
                    out.index = true;
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                } else {
                    return Err(meta.error("expected `name`, `key`, `index` or `skip`"));
                }
                Ok(())
            })?;
        }

        if out.skip && (out.key || out.index || out.name.is_some()) {
            return Err(Error::new(
                field.span(),
                "a skipped field cannot also be a key, an index or renamed",
            ));
        }

        Ok(out)
    }
}

fn non_empty(lit: LitStr) -> Result<LitStr, Error> {
    if lit.value().trim().is_empty() {
        Err(Error::new(lit.span(), "name must not be empty"))
    } else {
        Ok(lit)
    }
}

/// `UserProfile` -> `user_profile`
pub fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);

    for (i, ch) in ident.char_indices() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }

    out
}
