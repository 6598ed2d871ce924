use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// The fixed catalog of recognized skills, grouped by category. Categories
/// only matter for maintenance; matching flattens them.
pub struct Taxonomy {
    pub categories: Vec<(&'static str, Vec<&'static str>)>,
}

pub fn default_taxonomy() -> Taxonomy {
    Taxonomy {
        categories: vec![
            (
                "languages",
                vec![
                    "Python",
                    "JavaScript",
                    "TypeScript",
                    "Java",
                    "C++",
                    "C#",
                    "Go",
                    "Rust",
                    "Ruby",
                    "PHP",
                    "Swift",
                    "Kotlin",
                    "HTML",
                    "CSS",
                    "SQL",
                    "MATLAB",
                ],
            ),
            (
                "frameworks",
                vec![
                    "React",
                    "Angular",
                    "Vue",
                    "Node.js",
                    "Express",
                    "Django",
                    "Flask",
                    "Spring Boot",
                    "Spring Framework",
                    "ASP.NET",
                    "Rails",
                    "Next.js",
                    "React Native",
                    "Flutter",
                ],
            ),
            (
                "tools",
                vec![
                    "Git",
                    "Docker",
                    "Kubernetes",
                    "AWS",
                    "Azure",
                    "GCP",
                    "Jenkins",
                    "CircleCI",
                    "Terraform",
                    "Ansible",
                    "Jira",
                    "Figma",
                ],
            ),
            (
                "databases",
                vec![
                    "PostgreSQL",
                    "MySQL",
                    "MongoDB",
                    "Redis",
                    "Elasticsearch",
                    "Oracle",
                    "DynamoDB",
                    "Cassandra",
                ],
            ),
            (
                "ai_ml",
                vec![
                    "TensorFlow",
                    "PyTorch",
                    "Keras",
                    "Scikit-learn",
                    "Pandas",
                    "NumPy",
                    "OpenCV",
                    "NLP",
                    "LLM",
                    "Generative AI",
                    "Transformer",
                ],
            ),
        ],
    }
}

/// Whole-word matchers compiled once from a taxonomy. Built at startup and
/// passed into the tagger explicitly, never kept as ambient state.
pub struct SkillMatcher {
    entries: Vec<(String, Regex)>,
}

impl SkillMatcher {
    pub fn new(taxonomy: &Taxonomy) -> SkillMatcher {
        let entries = taxonomy
            .categories
            .iter()
            .flat_map(|(_, skills)| skills.iter())
            .map(|skill| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(skill));
                (skill.to_string(), Regex::new(&pattern).unwrap())
            })
            .collect();
        SkillMatcher { entries }
    }

    /// Scan a posting's text and return every recognized skill.
    pub fn tag(&self, text: &str) -> BTreeSet<String> {
        let mut skills = BTreeSet::new();
        let lower = text.to_lowercase();

        for (name, re) in &self.entries {
            if re.is_match(&lower) {
                skills.insert(name.clone());
            }
        }

        apply_aliases(&lower, &mut skills);
        skills
    }
}

static WORD_R_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\br\b").unwrap());
static R_AND_PYTHON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\br\s+and\s+python\b").unwrap());
static PYTHON_AND_R_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpython\s+and\s+r\b").unwrap());

// Compound tokens that whole-word matching misses ("node.js" contains a word
// boundary at the dot), plus the R-vs-the-letter-r disambiguation.
fn apply_aliases(lower: &str, skills: &mut BTreeSet<String>) {
    if lower.contains("node.js") || lower.contains("nodejs") {
        skills.insert("Node.js".to_string());
    }
    if lower.contains("react.js") || lower.contains("reactjs") {
        skills.insert("React".to_string());
    }

    // A lone "r" is almost always the letter; require contextual evidence
    // before tagging the language.
    if WORD_R_RE.is_match(lower)
        && (lower.contains("r programming")
            || lower.contains("r language")
            || lower.contains("rstudio")
            || R_AND_PYTHON_RE.is_match(lower)
            || PYTHON_AND_R_RE.is_match(lower))
    {
        skills.insert("R".to_string());
    }

    if lower.contains("spring boot")
        || lower.contains("spring framework")
        || lower.contains("spring mvc")
        || lower.contains("springframework")
    {
        skills.insert("Spring".to_string());
    }
}

// ── Tests ──
