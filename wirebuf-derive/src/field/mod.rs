mod map;
mod message;
mod scalar;

use anyhow::{bail, Error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, Lit, Meta, MetaNameValue, Token};

const MIN_TAG: u32 = 1;
const MAX_TAG: u32 = (1 << 29) - 1;

#[derive(Clone)]
pub enum Field {
    /// A scalar field.
    Scalar(scalar::Field),
    /// An embedded message field.
    Message(message::Field),
    /// A map field.
    Map(map::Field),
    /// A reserved field-number slot with no storage behind it.
    Reserved { tag: u32 },
}

impl Field {
    /// Creates a new `Field` from an iterator of field attributes.
    ///
    /// If the attributes are invalid an error is returned. If the field
    /// carries no `wirebuf` attribute it is not a protocol field, and
    /// `Ok(None)` is returned.
    pub fn new(attrs: Vec<Attribute>, inferred_tag: Option<u32>) -> Result<Option<Field>, Error> {
        let attrs = wirebuf_attrs(attrs)?;
        if attrs.is_empty() {
            return Ok(None);
        }

        let field = if attrs.iter().any(|attr| word_attr("reserved", attr)) {
            let mut tag = None;
            for attr in &attrs {
                if word_attr("reserved", attr) {
                    continue;
                } else if let Some(t) = tag_attr(attr)? {
                    set_option(&mut tag, t, "duplicate tag attributes")?;
                } else {
                    bail!("unknown attribute for reserved field: {:?}", attr);
                }
            }
            Field::Reserved {
                tag: check_tag(tag.or(inferred_tag))?,
            }
        } else if let Some(field) = map::Field::new(&attrs, inferred_tag)? {
            Field::Map(field)
        } else if let Some(field) = message::Field::new(&attrs, inferred_tag)? {
            Field::Message(field)
        } else if let Some(field) = scalar::Field::new(&attrs, inferred_tag)? {
            Field::Scalar(field)
        } else {
            bail!("no type attribute");
        };

        Ok(Some(field))
    }

    /// The field number this field occupies.
    pub fn tag(&self) -> u32 {
        match self {
            Field::Scalar(scalar) => scalar.tag,
            Field::Message(message) => message.tag,
            Field::Map(map) => map.tag,
            Field::Reserved { tag } => *tag,
        }
    }

    /// Returns a statement which encodes the field. Reserved slots are
    /// never written.
    pub fn encode(&self, ident: TokenStream) -> TokenStream {
        match self {
            Field::Scalar(scalar) => scalar.encode(ident),
            Field::Message(message) => message.encode(ident),
            Field::Map(map) => map.encode(ident),
            Field::Reserved { .. } => quote!(),
        }
    }

    /// Returns an expression which evaluates to the result of merging a
    /// decoded value into the field. Reserved slots have no storage and
    /// decode through the unknown-field path instead.
    pub fn merge(&self, ident: TokenStream) -> Option<TokenStream> {
        match self {
            Field::Scalar(scalar) => Some(scalar.merge(ident)),
            Field::Message(message) => Some(message.merge(ident)),
            Field::Map(map) => Some(map.merge(ident)),
            Field::Reserved { .. } => None,
        }
    }

    /// Returns an expression which evaluates to the encoded length of the
    /// field.
    pub fn encoded_len(&self, ident: TokenStream) -> TokenStream {
        match self {
            Field::Scalar(scalar) => scalar.encoded_len(ident),
            Field::Message(message) => message.encoded_len(ident),
            Field::Map(map) => map.encoded_len(ident),
            Field::Reserved { .. } => quote!(0),
        }
    }

    /// Returns a statement which resets the field to its default value.
    pub fn clear(&self, ident: TokenStream) -> Option<TokenStream> {
        match self {
            Field::Scalar(scalar) => Some(scalar.clear(ident)),
            Field::Message(message) => Some(message.clear(ident)),
            Field::Map(map) => Some(map.clear(ident)),
            Field::Reserved { .. } => None,
        }
    }

    /// Returns methods to embed in the message, currently the enumeration
    /// accessors.
    pub fn methods(&self, ident: &TokenStream) -> Option<TokenStream> {
        match self {
            Field::Scalar(scalar) => scalar.methods(ident),
            _ => None,
        }
    }
}

pub(crate) fn check_tag(tag: Option<u32>) -> Result<u32, Error> {
    match tag {
        Some(tag) if (MIN_TAG..=MAX_TAG).contains(&tag) => Ok(tag),
        Some(tag) => bail!("tag must be within [{}, {}]: {}", MIN_TAG, MAX_TAG, tag),
        None => bail!("missing tag attribute"),
    }
}

/// Get the items belonging to the `wirebuf` list attribute, e.g.
/// `#[wirebuf(int32, tag = "4")]`.
fn wirebuf_attrs(attrs: Vec<Attribute>) -> Result<Vec<Meta>, Error> {
    let mut result = Vec::new();
    for attr in attrs.iter() {
        if let Meta::List(meta_list) = &attr.meta {
            if meta_list.path.is_ident("wirebuf") {
                result.extend(
                    meta_list
                        .parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?
                        .into_iter(),
                )
            }
        }
    }
    Ok(result)
}

pub(crate) fn word_attr(key: &str, attr: &Meta) -> bool {
    if let Meta::Path(path) = attr {
        path.is_ident(key)
    } else {
        false
    }
}

pub(crate) fn tag_attr(attr: &Meta) -> Result<Option<u32>, Error> {
    if !attr.path().is_ident("tag") {
        return Ok(None);
    }
    match attr {
        Meta::NameValue(MetaNameValue {
            value: Expr::Lit(ExprLit { lit, .. }),
            ..
        }) => match lit {
            Lit::Str(lit) => lit.value().parse::<u32>().map_err(Error::from).map(Some),
            Lit::Int(lit) => Ok(Some(lit.base10_parse()?)),
            _ => bail!("invalid tag attribute: {:?}", attr),
        },
        _ => bail!("invalid tag attribute: {:?}", attr),
    }
}

pub(crate) fn bool_attr(key: &str, attr: &Meta) -> Result<Option<bool>, Error> {
    if !attr.path().is_ident(key) {
        return Ok(None);
    }
    match attr {
        Meta::Path(_) => Ok(Some(true)),
        Meta::NameValue(MetaNameValue {
            value: Expr::Lit(ExprLit { lit, .. }),
            ..
        }) => match lit {
            Lit::Str(lit) => lit.value().parse::<bool>().map_err(Error::from).map(Some),
            Lit::Bool(lit) => Ok(Some(lit.value())),
            _ => bail!("invalid {} attribute", key),
        },
        _ => bail!("invalid {} attribute", key),
    }
}

pub(crate) fn set_option<T>(option: &mut Option<T>, value: T, message: &str) -> Result<(), Error>
where
    T: core::fmt::Debug,
{
    if let Some(existing) = option {
        bail!("{}: {:?} and {:?}", message, existing, value);
    }
    *option = Some(value);
    Ok(())
}

pub(crate) fn set_bool(b: &mut bool, message: &str) -> Result<(), Error> {
    if *b {
        bail!("{}", message);
    } else {
        *b = true;
        Ok(())
    }
}

/// The label of a field: `optional` or `repeated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Optional,
    Repeated,
}

impl Label {
    fn from_attr(attr: &Meta) -> Option<Label> {
        if let Meta::Path(path) = attr {
            if path.is_ident("optional") {
                return Some(Label::Optional);
            }
            if path.is_ident("repeated") {
                return Some(Label::Repeated);
            }
        }
        None
    }
}
