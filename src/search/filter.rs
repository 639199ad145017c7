//! Search filter and sort order.

use super::file_result::SearchFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    None,
    RelevanceAsc,
    RelevanceDesc,
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
    SizeAsc,
    SizeDesc,
    SharedByCountAsc,
    SharedByCountDesc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::None
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchFilter {
    /// Both set or neither.
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    pub file_type: Option<u8>,
    pub file_format: Option<u16>,
    pub size_min: Option<u64>,
    pub size_max: Option<u64>,
    pub sort: SortOrder,
}

impl SearchFilter {
    pub fn matches(&self, file: &SearchFile) -> bool {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if file.date < from || file.date > to {
                return false;
            }
        }
        if let Some(file_type) = self.file_type {
            if file.file_type != file_type {
                return false;
            }
        }
        if let Some(file_format) = self.file_format {
            if file.file_format != file_format {
                return false;
            }
        }
        if let Some(min) = self.size_min {
            if file.size < min {
                return false;
            }
        }
        if let Some(max) = self.size_max {
            if file.size > max {
                return false;
            }
        }
        true
    }
}

/// Sorts `files` in place per `sort`. Relevance sorts fall back to date
/// as a secondary key until a real relevance score is wired in.
pub fn apply_sort(files: &mut [SearchFile], sort: SortOrder) {
    match sort {
        SortOrder::None => {}
        SortOrder::RelevanceAsc | SortOrder::DateAsc => files.sort_by_key(|f| f.date),
        SortOrder::RelevanceDesc | SortOrder::DateDesc => {
            files.sort_by_key(|f| std::cmp::Reverse(f.date))
        }
        SortOrder::NameAsc => files.sort_by(|a, b| a.name.cmp(&b.name)),
        SortOrder::NameDesc => files.sort_by(|a, b| b.name.cmp(&a.name)),
        SortOrder::SizeAsc => files.sort_by_key(|f| f.size),
        SortOrder::SizeDesc => files.sort_by_key(|f| std::cmp::Reverse(f.size)),
        SortOrder::SharedByCountAsc => files.sort_by_key(|f| f.shared_by_count),
        SortOrder::SharedByCountDesc => files.sort_by_key(|f| std::cmp::Reverse(f.shared_by_count)),
    }
}
