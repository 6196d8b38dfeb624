use std::path::{Path, PathBuf};

/// One caller-supplied "fetch this URI to this destination" item.
///
/// `destination` is interpreted relative to the engine root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub uri:         String,
    pub destination: PathBuf,
}

impl Target {
    pub fn new(uri: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            uri:         uri.into(),
            destination: destination.into(),
        }
    }
}

impl<U: Into<String>, P: Into<PathBuf>> From<(U, P)> for Target {
    fn from((uri, destination): (U, P)) -> Self { Self::new(uri, destination) }
}

/// A [`Target`] bound to its position in the batch.
///
/// `index` is only used to place the result; it never influences scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub index:  usize,
    pub target: Target,
}

impl FetchRequest {
    pub fn new(index: usize, target: Target) -> Self { Self { index, target } }

    /// Number a sequence of targets in input order.
    pub fn batch<I, T>(targets: I) -> Vec<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        targets
            .into_iter()
            .enumerate()
            .map(|(index, target)| Self::new(index, target.into()))
            .collect()
    }

    pub fn uri(&self) -> &str { &self.target.uri }

    pub fn destination(&self) -> &Path { &self.target.destination }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_numbers_in_input_order() {
        let requests = FetchRequest::batch([
            ("https://x/a.json", "out/a.json"),
            ("https://x/b.json", "out/b.json"),
            ("https://x/c.json", "out/c.json"),
        ]);

        assert_eq!(requests.len(), 3);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.index, i);
        }
        assert_eq!(requests[1].uri(), "https://x/b.json");
        assert_eq!(requests[2].destination(), Path::new("out/c.json"));
    }
}
