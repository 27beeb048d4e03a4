use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ItemFn, LitBool, LitInt, LitStr, Type};

#[derive(Clone, Copy)]
enum Format {
    Table,
    Json,
    JsonPretty,
    Text,
}

impl Format {
    fn to_tokens(self) -> proc_macro2::TokenStream {
        match self {
            Format::Table => quote!(memtally::Format::Table),
            Format::Json => quote!(memtally::Format::Json),
            Format::JsonPretty => quote!(memtally::Format::JsonPretty),
            Format::Text => quote!(memtally::Format::Text),
        }
    }
}

/// Tracks allocations made through the entry point's tracker and prints usage and leak
/// reports when it returns.
///
/// The function may take no parameters, or exactly one `&mut memtally::Tracker` parameter
/// which is bound to the guard's tracker.
///
/// # Parameters
///
/// * `format` - Output format as a string: `"table"` (default), `"json"`, `"json-pretty"` or `"text"`
/// * `limit` - Maximum number of leaks to display (0 = show all). Default: `0`
/// * `reclaim` - Release still-live blocks after reporting. Default: `false`
///
/// # Examples
///
/// ```rust,ignore
/// #[memtally::main]
/// fn main(tracker: &mut memtally::Tracker) {
///     let ptr = tracker.allocate(1000, memtally::call_site!()).unwrap();
///     unsafe { tracker.free(ptr, memtally::call_site!()) };
/// }
/// ```
///
/// Plain text output, at most 10 leaks:
///
/// ```rust,ignore
/// #[memtally::main(format = "text", limit = 10)]
/// fn main(tracker: &mut memtally::Tracker) {
///     // Your code here
/// }
/// ```
///
/// # Usage with Tokio
///
/// Place `#[memtally::main]` before `#[tokio::main]` so the tracker parameter is removed
/// before tokio sees the signature:
///
/// ```rust,ignore
/// #[memtally::main(format = "json")]
/// #[tokio::main(flavor = "current_thread")]
/// async fn main(tracker: &mut memtally::Tracker) {
///     // Your code here
/// }
/// ```
///
/// # See Also
///
/// * [`TrackerBuilder`](../memtally/struct.TrackerBuilder.html) - Manual control over the guard
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let attrs = &input.attrs;
    let block = &input.block;

    let mut format = Format::Table;
    let mut limit: usize = 0;
    let mut reclaim = false;

    // Parse named args like: format="..", limit=N, reclaim=bool
    if !attr.is_empty() {
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("format") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: LitStr = meta.input.parse()?;
                format = match lit.value().as_str() {
                    "table" => Format::Table,
                    "json" => Format::Json,
                    "json-pretty" => Format::JsonPretty,
                    "text" => Format::Text,
                    other => return Err(meta.error(format!(
                        "Unknown format {:?}. Expected one of: \"table\", \"json\", \"json-pretty\", \"text\"",
                        other
                    ))),
                };
                return Ok(());
            }

            if meta.path.is_ident("limit") {
                meta.input.parse::<syn::Token![=]>()?;
                let li: LitInt = meta.input.parse()?;
                limit = li.base10_parse()?;
                return Ok(());
            }

            if meta.path.is_ident("reclaim") {
                meta.input.parse::<syn::Token![=]>()?;
                let lb: LitBool = meta.input.parse()?;
                reclaim = lb.value;
                return Ok(());
            }

            Err(meta.error(
                "Unknown parameter. Supported: format=\"..\", limit=N, reclaim=true|false",
            ))
        });

        if let Err(e) = parser.parse2(proc_macro2::TokenStream::from(attr)) {
            return e.to_compile_error().into();
        }
    }

    let mut sig = input.sig.clone();
    let tracker_binding = match sig.inputs.len() {
        0 => None,
        1 => match sig.inputs.first() {
            Some(FnArg::Typed(arg)) => match arg.ty.as_ref() {
                Type::Reference(reference) if reference.mutability.is_some() => {
                    let pat = &arg.pat;
                    let ty = &arg.ty;
                    Some(quote! { let #pat: #ty = &mut *_memtally; })
                }
                _ => {
                    return syn::Error::new(
                        arg.ty.span(),
                        "expected a `&mut memtally::Tracker` parameter",
                    )
                    .to_compile_error()
                    .into();
                }
            },
            _ => {
                return syn::Error::new(sig.inputs.span(), "methods are not supported")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(
                sig.inputs.span(),
                "expected no parameters or a single `&mut memtally::Tracker`",
            )
            .to_compile_error()
            .into();
        }
    };
    sig.inputs.clear();

    let format_token = format.to_tokens();
    let asyncness = sig.asyncness.is_some();
    let fn_name = &sig.ident;

    let guard_init = quote! {
        #[allow(unused_mut)]
        let mut _memtally = {
            let caller_name: &'static str =
                concat!(module_path!(), "::", stringify!(#fn_name));

            memtally::TrackerBuilder::new(caller_name)
                .limit(#limit)
                .reclaim_leaks(#reclaim)
                .format(#format_token)
                .build()
        };
        #tracker_binding
    };

    let body = quote! {
        #guard_init
        #block
    };

    let wrapped_body = if asyncness {
        quote! { async { #body }.await }
    } else {
        body
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #wrapped_body
        }
    };

    output.into()
}
