mod enrich;
mod extractor;
mod scanner;
mod walk;

pub use self::enrich::{EnrichmentStatus, JobOutcome};
pub use self::extractor::{ContentExtractor, MetadataExtractor};
pub use self::scanner::Scanner;
