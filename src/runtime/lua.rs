/// Lua workflow loader using mlua
///
/// Every workflow file gets its own Lua state. The file's top-level chunk runs once
/// at load time, then the loader looks for the `run_workflow` global and binds it as
/// the entry point. Uploaded code runs with full trust: the standard library is
/// available and nothing is sandboxed.
///
/// Expected module shape:
///
/// ```lua
/// WORKFLOW_DESCRIPTION = "Repeats what you say"   -- optional
///
/// function WorkflowInput(fields)                   -- optional input constructor
///   return { input_as_text = fields.input_as_text }
/// end
///
/// function run_workflow(input)
///   return "Echo: " .. input.input_as_text         -- or { output_text = ... }, or nil
/// end
/// ```

use crate::runtime::loader::{EntryPoint, LoadError, LoadedWorkflow, WorkflowLoader, WorkflowOutput};
use mlua::{Function, Lua, Value};
use serde_json::Value as JsonValue;
use std::{fs, io, path::Path, sync::Arc};

/// Global function every workflow must define
pub const ENTRY_POINT: &str = "run_workflow";

/// Optional global used to build the entry point's input
pub const INPUT_CONSTRUCTOR: &str = "WorkflowInput";

/// Optional global string overriding the derived description
pub const DESCRIPTION_GLOBAL: &str = "WORKFLOW_DESCRIPTION";

/// Table nesting beyond this depth is rendered as null when stringifying
const MAX_JSON_DEPTH: usize = 32;

/// Loads `.lua` workflow files into isolated Lua states
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaWorkflowLoader;

impl LuaWorkflowLoader {
    pub fn new() -> Self {
        Self
    }
}

impl WorkflowLoader for LuaWorkflowLoader {
    fn source_extension(&self) -> &str {
        "lua"
    }

    fn load(&self, path: &Path) -> Result<LoadedWorkflow, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => {
                LoadError::contract(path, "workflow file is not valid UTF-8 text")
            }
            _ => LoadError::Io(e),
        })?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!("📥 Evaluating Lua workflow '{}' from {}", name, path.display());

        let lua = Lua::new();
        lua.load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(|e| LoadError::contract(path, format!("module failed to evaluate: {}", e)))?;

        let globals = lua.globals();

        let entry = match globals.get::<Value>(ENTRY_POINT) {
            Ok(Value::Function(function)) => function,
            Ok(Value::Nil) => {
                return Err(LoadError::contract(
                    path,
                    format!("no {}() function found", ENTRY_POINT),
                ))
            }
            Ok(other) => {
                return Err(LoadError::contract(
                    path,
                    format!("{} must be a function, found {}", ENTRY_POINT, other.type_name()),
                ))
            }
            Err(e) => return Err(LoadError::contract(path, e.to_string())),
        };

        let input = match globals.get::<Value>(INPUT_CONSTRUCTOR) {
            Ok(Value::Function(constructor)) => InputShape::Constructor(constructor),
            _ => InputShape::Table,
        };

        let description = match globals.get::<Value>(DESCRIPTION_GLOBAL) {
            Ok(Value::String(text)) => text.to_str().map(|s| s.to_string()).ok(),
            _ => None,
        }
        .unwrap_or_else(|| format!("Lua workflow: {}", name));

        tracing::info!("🧩 Loaded Lua workflow '{}' from {}", name, path.display());

        Ok(LoadedWorkflow::new(
            name,
            description,
            Arc::new(LuaEntryPoint { lua, entry, input }),
        ))
    }
}

/// How the entry point's input value is built, decided once at load time
enum InputShape {
    /// Pass a plain `{ input_as_text = ... }` table
    Table,
    /// Pass the plain table through the module's `WorkflowInput` first
    Constructor(Function),
}

/// Entry point bound to a function inside a workflow's own Lua state
struct LuaEntryPoint {
    /// Keeps the state that owns `entry` alive
    lua: Lua,
    entry: Function,
    input: InputShape,
}

impl LuaEntryPoint {
    fn build_input(&self, input_as_text: &str) -> mlua::Result<Value> {
        let fields = self.lua.create_table()?;
        fields.set("input_as_text", input_as_text)?;

        match &self.input {
            InputShape::Table => Ok(Value::Table(fields)),
            InputShape::Constructor(constructor) => constructor.call::<Value>(fields),
        }
    }
}

impl EntryPoint for LuaEntryPoint {
    fn invoke(&self, input_as_text: &str) -> Result<WorkflowOutput, String> {
        let input = self
            .build_input(input_as_text)
            .map_err(|e| format!("failed to build workflow input: {}", e))?;

        let result = self.entry.call::<Value>(input).map_err(|e| e.to_string())?;

        classify_output(result)
    }
}

/// Sort an entry point's return value into a [`WorkflowOutput`] variant
fn classify_output(value: Value) -> Result<WorkflowOutput, String> {
    let output = match value {
        Value::Nil => WorkflowOutput::Empty,
        Value::String(text) => WorkflowOutput::Text(lua_string(&text)?),
        Value::Table(table) => match table.get::<Value>("output_text") {
            Ok(Value::String(text)) => WorkflowOutput::Structured {
                output_text: lua_string(&text)?,
            },
            _ => {
                let json = lua_to_json(Value::Table(table), 0)?;
                WorkflowOutput::Other(json.to_string())
            }
        },
        Value::Boolean(b) => WorkflowOutput::Other(b.to_string()),
        Value::Integer(i) => WorkflowOutput::Other(i.to_string()),
        Value::Number(n) => WorkflowOutput::Other(n.to_string()),
        other => WorkflowOutput::Other(format!("<{}>", other.type_name())),
    };

    Ok(output)
}

fn lua_string(text: &mlua::String) -> Result<String, String> {
    text.to_str()
        .map(|s| s.to_string())
        .map_err(|e| format!("Invalid UTF-8 in Lua string: {}", e))
}

/// Convert a Lua value to JSON for display
///
/// Tables with keys 1..n become arrays, other tables become objects. Functions,
/// userdata and threads become null.
fn lua_to_json(value: Value, depth: usize) -> Result<JsonValue, String> {
    if depth > MAX_JSON_DEPTH {
        return Ok(JsonValue::Null);
    }

    match value {
        Value::Nil => Ok(JsonValue::Null),
        Value::Boolean(b) => Ok(JsonValue::Bool(b)),
        Value::Integer(i) => Ok(JsonValue::from(i)),
        Value::Number(f) => Ok(serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        Value::String(s) => lua_string(&s).map(JsonValue::String),
        Value::Table(table) => {
            let mut max_index = 0;
            let mut count = 0;
            let mut is_array = true;

            for pair in table.pairs::<Value, Value>() {
                let (key, _) = pair.map_err(|e| format!("Failed to iterate Lua table: {}", e))?;
                count += 1;
                match key {
                    Value::Integer(i) if i > 0 => max_index = max_index.max(i as usize),
                    _ => {
                        is_array = false;
                        break;
                    }
                }
            }

            if is_array && count > 0 && count == max_index {
                let mut items = Vec::with_capacity(max_index);
                for i in 1..=max_index {
                    let item = table
                        .get::<Value>(i)
                        .map_err(|e| format!("Failed to read Lua table value: {}", e))?;
                    items.push(lua_to_json(item, depth + 1)?);
                }
                Ok(JsonValue::Array(items))
            } else {
                let mut object = serde_json::Map::new();
                for pair in table.pairs::<Value, Value>() {
                    let (key, item) =
                        pair.map_err(|e| format!("Failed to iterate Lua table: {}", e))?;
                    let key = match key {
                        Value::String(s) => lua_string(&s)?,
                        Value::Integer(i) => i.to_string(),
                        Value::Number(f) => f.to_string(),
                        _ => continue,
                    };
                    object.insert(key, lua_to_json(item, depth + 1)?);
                }
                Ok(JsonValue::Object(object))
            }
        }
        _ => Ok(JsonValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::loader::{WorkflowError, EMPTY_OUTPUT_PLACEHOLDER};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_workflow(dir: &TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(format!("{}.lua", name));
        fs::write(&path, source).unwrap();
        path
    }

    fn load(dir: &TempDir, name: &str, source: &str) -> Result<LoadedWorkflow, LoadError> {
        let path = write_workflow(dir, name, source);
        LuaWorkflowLoader::new().load(&path)
    }

    #[tokio::test]
    async fn plain_string_output_is_returned_verbatim() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "echo",
            r#"function run_workflow(input) return "Echo: " .. input.input_as_text end"#,
        )
        .unwrap();

        assert_eq!(workflow.name(), "echo");
        assert_eq!(workflow.description(), "Lua workflow: echo");
        assert_eq!(workflow.run("hi").await.unwrap(), "Echo: hi");
    }

    #[tokio::test]
    async fn structured_output_uses_output_text_field() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "structured",
            r#"
            function run_workflow(input)
              return { output_text = "Answer to " .. input.input_as_text, tokens = 3 }
            end
            "#,
        )
        .unwrap();

        assert_eq!(workflow.run("life").await.unwrap(), "Answer to life");
    }

    #[tokio::test]
    async fn missing_output_yields_placeholder() {
        let dir = TempDir::new().unwrap();
        let workflow = load(&dir, "silent", "function run_workflow(input) end").unwrap();

        assert_eq!(workflow.run("anything").await.unwrap(), EMPTY_OUTPUT_PLACEHOLDER);
    }

    #[tokio::test]
    async fn other_outputs_are_stringified() {
        let dir = TempDir::new().unwrap();
        let number = load(&dir, "number", "function run_workflow(input) return 42 end").unwrap();
        let list = r#"function run_workflow(input) return { "a", "b" } end"#;
        let table = load(&dir, "table", list).unwrap();
        let object = load(&dir, "object", "function run_workflow(input) return { score = 7 } end");
        let object = object.unwrap();

        assert_eq!(number.run("x").await.unwrap(), "42");
        assert_eq!(table.run("x").await.unwrap(), r#"["a","b"]"#);
        assert_eq!(object.run("x").await.unwrap(), r#"{"score":7}"#);
    }

    #[tokio::test]
    async fn module_input_constructor_is_used_when_present() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "typed",
            r#"
            function WorkflowInput(fields)
              return { input_as_text = fields.input_as_text, typed = true }
            end

            function run_workflow(input)
              if input.typed then return "typed:" .. input.input_as_text end
              return "untyped"
            end
            "#,
        )
        .unwrap();

        assert_eq!(workflow.run("hello").await.unwrap(), "typed:hello");
    }

    #[tokio::test]
    async fn module_state_persists_between_runs() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "counter",
            r#"
            local calls = 0
            function run_workflow(input)
              calls = calls + 1
              return tostring(calls)
            end
            "#,
        )
        .unwrap();

        assert_eq!(workflow.run("a").await.unwrap(), "1");
        assert_eq!(workflow.run("b").await.unwrap(), "2");
    }

    #[test]
    fn description_global_overrides_default() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "described",
            r#"
            WORKFLOW_DESCRIPTION = "Answers billing questions"
            function run_workflow(input) return "ok" end
            "#,
        )
        .unwrap();

        assert_eq!(workflow.description(), "Answers billing questions");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = LuaWorkflowLoader::new()
            .load(&dir.path().join("ghost.lua"))
            .unwrap_err();

        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn module_without_entry_point_violates_contract() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir, "empty", "local answer = 42").unwrap_err();

        match err {
            LoadError::ContractViolation { reason, .. } => assert!(reason.contains("run_workflow")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_function_entry_point_violates_contract() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir, "number", "run_workflow = 5").unwrap_err();

        match err {
            LoadError::ContractViolation { reason, .. } => assert!(reason.contains("number")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn syntax_errors_violate_contract() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir, "broken", "function run_workflow(").unwrap_err();

        assert!(matches!(err, LoadError::ContractViolation { .. }));
    }

    #[test]
    fn errors_raised_at_load_time_violate_contract() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir, "raises", r#"error("missing api key")"#).unwrap_err();

        assert!(err.to_string().contains("missing api key"));
    }

    #[test]
    fn validate_matches_load() {
        let dir = TempDir::new().unwrap();
        let good = write_workflow(&dir, "good", "function run_workflow(input) return 'ok' end");
        let bad = write_workflow(&dir, "bad", "print('no entry point')");
        let loader = LuaWorkflowLoader::new();

        assert!(loader.validate(&good));
        assert!(!loader.validate(&bad));
        assert!(!loader.validate(&dir.path().join("ghost.lua")));
    }

    #[tokio::test]
    async fn runtime_errors_propagate_with_workflow_name() {
        let dir = TempDir::new().unwrap();
        let workflow = load(
            &dir,
            "fails",
            r#"function run_workflow(input) error("upstream timeout") end"#,
        )
        .unwrap();

        let err = workflow.run("hi").await.unwrap_err();
        let WorkflowError::Execution { workflow: name, message } = err;
        assert_eq!(name, "fails");
        assert!(message.contains("upstream timeout"));
    }
}
