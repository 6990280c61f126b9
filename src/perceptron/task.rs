use std::fmt;

use crate::linalg::{SizeMismatch, Vector};

/// Single learning example: an input and the output desired for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Vector,
    pub output: Vector,
}

impl Example {
    pub fn new(input: Vector, output: Vector) -> Example {
        Example { input, output }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Input:  {}", self.input)?;
        write!(f, "Output: {}", self.output)
    }
}

/// Ordered collection of examples which all share the same input and output dimensions.
///
/// Dimensions are checked once, when an example is added, so the training code can
/// rely on every example fitting the task.
///
/// # Examples
/// ```
/// # use rpmlp::perceptron::Task;
/// let mut task = Task::new(2, 1).unwrap();
/// task.add(vec![0.0, 1.0].into(), vec![1.0].into()).unwrap();
/// assert!(task.add(vec![0.0].into(), vec![1.0].into()).is_err());
/// assert_eq!(task.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    input_dimension: usize,
    output_dimension: usize,
    examples: Vec<Example>,
}

impl Task {
    pub fn new(input_dimension: usize, output_dimension: usize) -> Result<Task, TaskError> {
        if input_dimension < 1 || output_dimension < 1 {
            return Err(TaskError::BadDimensions {
                input: input_dimension,
                output: output_dimension,
            });
        }
        Ok(Task {
            input_dimension,
            output_dimension,
            examples: Vec::new(),
        })
    }

    /// Builds task from `(input, output)` pairs, checking each of them.
    pub fn from_pairs(
        input_dimension: usize,
        output_dimension: usize,
        pairs: impl IntoIterator<Item = (Vec<f64>, Vec<f64>)>,
    ) -> Result<Task, TaskError> {
        let mut task = Task::new(input_dimension, output_dimension)?;
        for (input, output) in pairs {
            task.add(input.into(), output.into())?;
        }
        Ok(task)
    }

    pub fn add(&mut self, input: Vector, output: Vector) -> Result<(), TaskError> {
        self.push(Example::new(input, output))
    }

    pub fn push(&mut self, example: Example) -> Result<(), TaskError> {
        if example.input.dimension() != self.input_dimension {
            return Err(TaskError::WrongExampleInputs(SizeMismatch {
                expected: self.input_dimension,
                got: example.input.dimension(),
            }));
        }
        if example.output.dimension() != self.output_dimension {
            return Err(TaskError::WrongExampleOutputs(SizeMismatch {
                expected: self.output_dimension,
                got: example.output.dimension(),
            }));
        }
        self.examples.push(example);
        Ok(())
    }

    pub fn input_dimension(&self) -> usize {
        self.input_dimension
    }

    pub fn output_dimension(&self) -> usize {
        self.output_dimension
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Example> {
        self.examples.iter()
    }
}

impl<'a> IntoIterator for &'a Task {
    type Item = &'a Example;
    type IntoIter = std::slice::Iter<'a, Example>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Learning examples of learning task")?;
        writeln!(f, "{}", super::report::DIVIDING_LINE)?;
        write!(
            f,
            "Input dimension: {}, Output dimension: {}",
            self.input_dimension, self.output_dimension
        )?;
        for example in self {
            write!(f, "\n{}\n{}", super::report::DIVIDING_LINE, example)?;
        }
        Ok(())
    }
}

/// Error structure for `Task`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Input and output dimensions must be at least 1, but got {input} and {output}!")]
    BadDimensions { input: usize, output: usize },
    #[error("Wrong example inputs. {0}")]
    WrongExampleInputs(SizeMismatch),
    #[error("Wrong example outputs. {0}")]
    WrongExampleOutputs(SizeMismatch),
}
