use folio_core::{AttributeSpec, ResourceSchema, SchemaRegistry, ValueType};

pub const BOOK: &str = "Book";
pub const PAGE: &str = "Page";

/// Books own an ordered list of pages; each page points back at its book and
/// collects the files scanned for it.
pub fn library() -> SchemaRegistry {
    SchemaRegistry::new()
        .register(
            ResourceSchema::new(BOOK)
                .attribute("title", AttributeSpec::single(ValueType::String).required())
                .attribute("author", AttributeSpec::multi(ValueType::String))
                .attribute("published_on", AttributeSpec::single(ValueType::DateTime))
                .attribute("member_ids", AttributeSpec::multi(ValueType::Id)),
        )
        .register(
            ResourceSchema::new(PAGE)
                .attribute(
                    "page_number",
                    AttributeSpec::single(ValueType::Integer).required(),
                )
                .attribute("book_id", AttributeSpec::single(ValueType::Id).required())
                .attribute("file_ids", AttributeSpec::multi(ValueType::Id)),
        )
}
