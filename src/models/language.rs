/// 支持的提交语言（内部标签）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp98,
    Cpp11,
    Java,
    Python3,
    Python2,
    Node,
    CSharp,
}

impl Language {
    /// 从内部语言标签解析，不支持的语言返回 None
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "c" => Some(Language::C),
            "cpp98" => Some(Language::Cpp98),
            "cpp11" => Some(Language::Cpp11),
            "java" => Some(Language::Java),
            "python3" => Some(Language::Python3),
            "python2" => Some(Language::Python2),
            "node" => Some(Language::Node),
            "csharp" => Some(Language::CSharp),
            _ => None,
        }
    }

    /// 内部语言标签
    pub fn tag(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp98 => "cpp98",
            Language::Cpp11 => "cpp11",
            Language::Java => "java",
            Language::Python3 => "python3",
            Language::Python2 => "python2",
            Language::Node => "node",
            Language::CSharp => "csharp",
        }
    }

    /// LOJ 语言菜单里的 `data-value`
    pub fn remote_tag(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp98 => "cpp",
            Language::Cpp11 => "cpp11",
            Language::Java => "java",
            Language::Python3 => "python3",
            Language::Python2 => "python2",
            Language::Node => "nodejs",
            Language::CSharp => "csharp",
        }
    }
}
