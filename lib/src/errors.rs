use std::fmt;

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) value: f64,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

/// A tensor or image whose shape can't be used
#[derive(Debug)]
pub enum ShapeError {
    /// Two shapes that have to agree didn't
    Mismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// At least one dimension is zero
    Empty {
        what: &'static str,
        shape: Vec<usize>,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "{} has shape {:?}, but {:?} was expected",
                what, actual, expected
            ),
            Self::Empty { what, shape } => {
                write!(f, "{} {:?} must not have empty dimensions", what, shape)
            }
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// A tensor or image size didn't match what it is combined with
    Shape(ShapeError),
    /// The layer selection can't be served by the feature network
    InvalidConfiguration(String),
    /// The activations and targets paired up in a loss term have different
    /// lengths
    LayerCountMismatch {
        kind: &'static str,
        activations: usize,
        targets: usize,
    },
    /// A required input, eg. the content image, was never provided
    MissingInput(&'static str),
    /// The network weights could not be loaded
    Weights(String),
    /// Tensor data could not be read back from the device
    Tensor(String),
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::Shape(se) => write!(f, "{}", se),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            Self::LayerCountMismatch {
                kind,
                activations,
                targets,
            } => write!(
                f,
                "{} {} activation(s) were provided, but there are {} target(s)",
                activations, kind, targets
            ),
            Self::MissingInput(name) => write!(f, "no {} was provided", name),
            Self::Weights(msg) => write!(f, "failed to load network weights: {}", msg),
            Self::Tensor(msg) => write!(f, "failed to read tensor data: {}", msg),
            Self::Io(io) => write!(f, "{}", io),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}

impl From<ShapeError> for Error {
    fn from(se: ShapeError) -> Self {
        Self::Shape(se)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layer_mismatch_message() {
        let err = Error::LayerCountMismatch {
            kind: "style",
            activations: 4,
            targets: 5,
        };

        assert_eq!(
            err.to_string(),
            "4 style activation(s) were provided, but there are 5 target(s)"
        );
    }

    #[test]
    fn shape_messages() {
        let err = Error::from(ShapeError::Mismatch {
            what: "content activation 0",
            expected: vec![1, 8, 4, 4],
            actual: vec![1, 8, 2, 2],
        });
        assert_eq!(
            err.to_string(),
            "content activation 0 has shape [1, 8, 2, 2], but [1, 8, 4, 4] was expected"
        );

        let err = Error::from(ShapeError::Empty {
            what: "target size",
            shape: vec![0, 300],
        });
        assert_eq!(
            err.to_string(),
            "target size [0, 300] must not have empty dimensions"
        );
    }
}
