use std::fmt;

/// Tag for the color domain (or codomain) a term or bag ranges over.
///
/// The cardinality is carried when the underlying color class is enumerable.
/// `None` means "not computable" and is never guessed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    pub name: String,
    pub card: Option<u64>,
}

impl Domain {
    pub fn new(name: &str, card: Option<u64>) -> Domain {
        Domain {
            name: String::from(name),
            card,
        }
    }

    /// The codomain of a tuple: the product of its factor sorts.
    pub fn product(factors: &[Domain]) -> Domain {
        let name = factors
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join("x");
        let card = factors.iter().map(|d| d.card).product();
        Domain { name, card }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
