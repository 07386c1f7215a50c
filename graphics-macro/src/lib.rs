use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derive `VertexData` (and `AttributeShape`) for a Pod struct, describing its
/// GPU attribute layout.
///
/// Each field becomes one attribute whose shape comes from the field type's
/// `AttributeShape` impl. A field whose type is itself a derived struct is
/// flattened into the parent, keeping its own field boundaries.
///
/// The struct must also derive `bytemuck::Pod`, `bytemuck::Zeroable`, `Copy`,
/// `Clone`, and have `#[repr(C)]`.
///
/// # Named structs
///
/// ```ignore
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
/// #[repr(C)]
/// struct ShapeInstance {
///     model: [[f32; 4]; 4],
///     color: [f32; 4],
/// }
/// ```
///
/// # Tuple structs
///
/// ```ignore
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
/// #[repr(C)]
/// struct Position(pub [f32; 3]);
/// ```
#[proc_macro_derive(VertexData)]
pub fn derive_vertex_data(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields: Vec<(String, &syn::Type)> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .filter_map(|f| f.ident.as_ref().map(|id| (id.to_string(), &f.ty)))
                .collect(),
            Fields::Unnamed(fields) => fields
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, f)| (i.to_string(), &f.ty))
                .collect(),
            Fields::Unit => Vec::new(),
        },
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "VertexData can only be derived for structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let with_fields = fields.iter().map(|(fname, ftype)| {
        quote! {
            .with_field(
                #fname,
                <#ftype as glint_graphics::layout::AttributeShape>::shape(),
            )
        }
    });

    let expanded = quote! {
        impl #impl_generics glint_graphics::layout::VertexData for #name #ty_generics #where_clause {
            fn describe() -> glint_graphics::layout::ElementDescription {
                glint_graphics::layout::ElementDescription::new(#name_str)
                    #(#with_fields)*
            }
        }

        impl #impl_generics glint_graphics::layout::AttributeShape for #name #ty_generics #where_clause {
            fn shape() -> glint_graphics::layout::Shape {
                glint_graphics::layout::Shape::Record(
                    <Self as glint_graphics::layout::VertexData>::describe().into_fields(),
                )
            }
        }
    };

    expanded.into()
}
