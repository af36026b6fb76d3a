// File boundary: image loading, image writing and cell CSV import/export

pub mod cells_csv;
pub mod loader;
pub mod writer;

pub use cells_csv::{read_cells_csv, write_cells_csv, CELLS_CSV_HEADER};
pub use loader::load_image;
pub use writer::save_slices;
