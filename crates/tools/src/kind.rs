//! The closed set of retrieval tools the model may call.

/// One of the six tools in the tag vocabulary.
///
/// A closed enum rather than open strings: adding a tool means extending
/// this type, and every `match` on it is checked exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Embedding search over indexed chunks.
    SemanticSearch,
    /// Keyword search over the index.
    LexicalSearch,
    /// Regular-expression search over file contents.
    RegexSearch,
    /// Whole-file retrieval.
    GetFileContent,
    /// Line-range retrieval from one file.
    GetFileSection,
    /// Fetch and extract a web page.
    WebCrawler,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::SemanticSearch,
        ToolKind::LexicalSearch,
        ToolKind::RegexSearch,
        ToolKind::GetFileContent,
        ToolKind::GetFileSection,
        ToolKind::WebCrawler,
    ];

    /// Resolve a wire name (`semantic_search`, ...) to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "semantic_search" => Some(Self::SemanticSearch),
            "lexical_search" => Some(Self::LexicalSearch),
            "regex_search" => Some(Self::RegexSearch),
            "get_file_content" => Some(Self::GetFileContent),
            "get_file_section" => Some(Self::GetFileSection),
            "web_crawler" => Some(Self::WebCrawler),
            _ => None,
        }
    }

    /// Wire name as it appears inside tag elements.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SemanticSearch => "semantic_search",
            Self::LexicalSearch => "lexical_search",
            Self::RegexSearch => "regex_search",
            Self::GetFileContent => "get_file_content",
            Self::GetFileSection => "get_file_section",
            Self::WebCrawler => "web_crawler",
        }
    }

    /// Opening tag of the call block for this tool.
    pub fn opener(&self) -> String {
        format!("<tool_{}>", self.name())
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
