use serde_json::{json, Value};

/// Tool definitions in the flat Responses shape sent as `tools`.
pub fn definitions() -> Value {
    let converted = tool_schemas()
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .map(|tool| {
                    let mut parameters = tool
                        .get("parameters")
                        .cloned()
                        .unwrap_or_else(|| json!({ "type": "object", "properties": {} }));
                    if let Some(object) = parameters.as_object_mut() {
                        object.insert("additionalProperties".to_string(), Value::Bool(false));
                    }
                    json!({
                        "type": "function",
                        "name": tool.get("name").cloned().unwrap_or_else(|| json!("")),
                        "description": tool.get("description").cloned().unwrap_or_else(|| json!("")),
                        "parameters": parameters,
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Value::Array(converted)
}

fn tool_schemas() -> Value {
    json!([
        {
            "name": "insert_terminal_command",
            "description": "Insert command text into the active terminal input without running it.",
            "parameters": {
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to insert." }
                },
                "required": ["command"]
            }
        },
        {
            "name": "execute_editor_control",
            "description": "Control editor navigation and focus.",
            "parameters": {
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["open_file_at_line", "goto_line", "focus_terminal", "focus_editor"]
                    },
                    "filePath": { "type": "string" },
                    "line": { "type": "number" },
                    "column": { "type": "number" }
                },
                "required": ["action"]
            }
        },
        {
            "name": "apply_editor_edit",
            "description": "Apply a concrete text replacement in the active editor. Lines and columns are 0-based.",
            "parameters": {
                "type": "object",
                "properties": {
                    "startLine": { "type": "number" },
                    "startCharacter": { "type": "number" },
                    "endLine": { "type": "number" },
                    "endCharacter": { "type": "number" },
                    "newText": { "type": "string" }
                },
                "required": ["startLine", "startCharacter", "endLine", "endCharacter", "newText"]
            }
        },
        {
            "name": "search_project_files",
            "description": "Search files in the current workspace by partial name or path.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Partial filename/path or keyword to search for." },
                    "maxResults": {
                        "type": "number",
                        "description": "Maximum number of matches to return (default 20, min 1, max 100)."
                    }
                },
                "required": ["query"]
            }
        },
        {
            "name": "search_available_commands",
            "description": "Search the host's commands and keyboard shortcuts by id, title, or key binding.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "maxResults": { "type": "number" },
                    "includeInternal": { "type": "boolean" }
                },
                "required": ["query"]
            }
        },
        {
            "name": "execute_host_command",
            "description": "Run a host command by id. Use search_available_commands first when unsure of the id.",
            "parameters": {
                "type": "object",
                "properties": {
                    "commandId": { "type": "string" },
                    "args": { "type": "array", "items": {} }
                },
                "required": ["commandId"]
            }
        },
        {
            "name": "execute_agent_handoff",
            "description": "Hand an agent-prefixed request to the coding assistant panel by adding the prompt to its thread.",
            "parameters": {
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "Prompt text to hand off." }
                },
                "required": ["prompt"]
            }
        },
        {
            "name": "execute_keypress",
            "description": "Send one key or one modifier combo to the focused application.",
            "parameters": {
                "type": "object",
                "properties": {
                    "keys": { "type": "string", "description": "Key sequence, e.g. Return, ctrl+d" }
                },
                "required": ["keys"]
            }
        },
        {
            "name": "read_clipboard",
            "description": "Read the system clipboard text.",
            "parameters": { "type": "object", "properties": {} }
        },
        {
            "name": "write_clipboard",
            "description": "Replace the system clipboard text.",
            "parameters": {
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }
        },
        {
            "name": "send_feedback",
            "description": "Show a short message to the user when no other action fits.",
            "parameters": {
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }
        }
    ])
}
