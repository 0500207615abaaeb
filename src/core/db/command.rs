/// Command Module
///
/// Commands, their parameters and per-execution options. A command is
/// driver-neutral except for the optional driver-specific parameter type
/// `T` carried by each parameter.
use crate::core::Value;

/// Seconds a command may wait before the driver gives up
pub const DEFAULT_COMMAND_TIMEOUT: u32 = 30;

/// How the command text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    /// Raw SQL text
    Text,
    /// Name of a stored procedure
    #[default]
    StoredProcedure,
}

/// Direction of a command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the driver writes a value back after execution
    pub fn is_output(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }

    /// Whether the parameter's value is sent to the server
    pub fn is_input(self) -> bool {
        matches!(
            self,
            ParameterDirection::Input | ParameterDirection::InputOutput
        )
    }
}

/// A named command parameter.
///
/// `db_type` and `size` are driver hints: the driver may coerce the value
/// to `db_type` and truncate output values to `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<T> {
    pub name: String,
    pub value: Value,
    pub direction: ParameterDirection,
    pub db_type: Option<T>,
    pub size: Option<usize>,
}

impl<T> Parameter<T> {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
            direction: ParameterDirection::Input,
            db_type: None,
            size: None,
        }
    }

    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_db_type(mut self, db_type: T) -> Self {
        self.db_type = Some(db_type);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Name without its leading `@`, `:` or `$` sigil
    pub fn bare_name(&self) -> &str {
        bare_parameter_name(&self.name)
    }
}

/// Strips a leading `@`, `:` or `$` from a parameter name.
pub fn bare_parameter_name(name: &str) -> &str {
    name.strip_prefix(|c: char| matches!(c, '@' | ':' | '$'))
        .unwrap_or(name)
}

/// A prepared command: text, type, timeout and ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Command<T> {
    pub text: String,
    pub command_type: CommandType,
    pub timeout: u32,
    pub parameters: Vec<Parameter<T>>,
}

impl<T> Default for Command<T> {
    fn default() -> Self {
        Command {
            text: String::new(),
            command_type: CommandType::default(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            parameters: Vec::new(),
        }
    }
}

impl<T> Command<T> {
    /// Parameters the driver writes back after execution
    pub fn output_parameters(&self) -> impl Iterator<Item = &Parameter<T>> {
        self.parameters.iter().filter(|p| p.direction.is_output())
    }
}

/// Options for a single execution.
///
/// The default runs a stored procedure with a 30 second timeout and
/// releases the connection afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    pub command_type: CommandType,
    pub timeout: u32,
    pub close_connection: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions {
            command_type: CommandType::StoredProcedure,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            close_connection: true,
        }
    }
}

impl CommandOptions {
    /// Run the command name as a stored procedure
    pub fn procedure() -> Self {
        Self::default()
    }

    /// Run the command name as SQL text
    pub fn text() -> Self {
        CommandOptions {
            command_type: CommandType::Text,
            ..Self::default()
        }
    }

    /// Keep the connection open after execution
    pub fn keep_open(mut self) -> Self {
        self.close_connection = false;
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_parameter_name() {
        assert_eq!(bare_parameter_name("@total"), "total");
        assert_eq!(bare_parameter_name(":id"), "id");
        assert_eq!(bare_parameter_name("$x"), "x");
        assert_eq!(bare_parameter_name("plain"), "plain");
    }

    #[test]
    fn test_output_parameters_filter() {
        let mut command: Command<()> = Command::default();
        command.parameters.push(Parameter::new("a", 1));
        command
            .parameters
            .push(Parameter::new("b", Value::Null).with_direction(ParameterDirection::Output));
        command.parameters.push(
            Parameter::new("c", 2).with_direction(ParameterDirection::InputOutput),
        );

        let names: Vec<&str> = command.output_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_command_options_builders() {
        let options = CommandOptions::text().keep_open().timeout(5);
        assert_eq!(options.command_type, CommandType::Text);
        assert!(!options.close_connection);
        assert_eq!(options.timeout, 5);

        let defaults = CommandOptions::procedure();
        assert_eq!(defaults.command_type, CommandType::StoredProcedure);
        assert_eq!(defaults.timeout, DEFAULT_COMMAND_TIMEOUT);
        assert!(defaults.close_connection);
    }
}
