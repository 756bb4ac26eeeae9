use super::filter::FilteredView;

/// Serialize the current filtered view back to delimited text: the source
/// header row first, then one row per matching record. Standard CSV escaping
/// only; an empty view yields header-only output.
pub fn to_csv(view: &FilteredView) -> Result<Vec<u8>, csv::Error> {
    let schema = view.schema();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&schema.columns)?;
    for record in view.records() {
        let row: Vec<String> = (0..schema.columns.len())
            .map(|col| record.cell_text(schema, col))
            .collect();
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
