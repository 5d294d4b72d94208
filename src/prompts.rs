//! Prompts for extracting SKU line items from quotation page images.
//!
//! The system prompt can be replaced through
//! [`crate::config::ExtractionConfig::system_prompt`]; whatever replaces it
//! must still ask for the `{"sku_data": [...]}` shape that
//! [`crate::pipeline::parse`] understands.

/// Default system prompt for quotation extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You read supplier quotation documents received by a pharmacy and extract every quoted product line.

Follow these rules precisely:

1. SUPPLIER
   - "sku_supplier" is the company that issued the quotation
     (e.g. NARSINGH PHARMA, MEDIVISION, S. D. M. AGENCY)
   - Never use the medicine manufacturer (Alembic, Cipla, ...) as the supplier

2. PRODUCT
   - "sku_name" is the product name, e.g. PARACETAMOL 500MG TAB
   - Write the same product the same way every time. These pairs are one product each:
     "GLUCONORM G 1" / "GLUCONORM G1"
     "JANUMET 50/500" / "JANUMET 50/500 TAB"
     "JUST TEAR E/D" / "JUST TEAR LUBRICANT E/D"
     "SEROFLO 250 R/C" / "SEROFLO 250 ROTA" / "SEROFLO 250 ROTACAP"
     "ATORVA 20MG TAB" / "ATORVA-20"
   - "sku_invoice" is the supplier's own item code, if printed

3. PRICES
   - "mrp", "base_rate" and "base_discount_percent" are strings, copied exactly as printed
   - "amount" is the total price for the listed quantity, as an integer

4. QUANTITIES
   - "paid_qty" is the billed quantity, as an integer
   - "free_qty" is the free (scheme) quantity, as an integer; 0 when there is none
   - "qty_str" is the quantity exactly as printed, e.g. "10+1"

5. OTHER
   - "batch_number" is usually labelled "Batch", e.g. IAK0040, 24491211, JT-2412
   - One entry per product line; a product listed twice gets two entries
   - Leave a field out when the document does not show it; never guess

6. OUTPUT FORMAT
   Output ONLY a JSON object of this shape, with no commentary and no code fences:
   {"sku_data": [{"sku_supplier": "", "sku_invoice": "", "sku_name": "", "mrp": "",
     "base_rate": "", "base_discount_percent": "", "paid_qty": 0, "free_qty": 0,
     "qty_str": "", "batch_number": "", "amount": 0}]}"#;

/// User-turn text sent with the page images of one document.
pub fn document_instruction(label: &str, page_count: usize) -> String {
    format!(
        "Quotation document \"{label}\" ({page_count} page{}). \
         Extract every product line from these pages.",
        if page_count == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_extracted_key() {
        for key in [
            "sku_data",
            "sku_supplier",
            "sku_invoice",
            "sku_name",
            "mrp",
            "base_rate",
            "base_discount_percent",
            "paid_qty",
            "free_qty",
            "qty_str",
            "batch_number",
            "amount",
        ] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(key), "missing {key}");
        }
    }

    #[test]
    fn instruction_pluralises() {
        assert!(document_instruction("a.pdf", 1).contains("(1 page)"));
        assert!(document_instruction("a.pdf", 3).contains("(3 pages)"));
    }
}
