use colored::Colorize;

pub struct Theme {
    pub prompt: String,
    pub continuation_prompt: String,
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub error_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "$ ".bright_cyan().to_string(),
            continuation_prompt: "> ".cyan().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "pipesh: Ctrl-D or `exit` to leave".bright_black().to_string(),
            exit_message: "bye".bright_black().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        "dark" => Theme {
            prompt: "➤ ".bright_purple().to_string(),
            continuation_prompt: "… ".purple().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "pipesh: Ctrl-D or `exit` to leave".purple().to_string(),
            exit_message: "bye".purple().to_string(),
            error_style: Box::new(|s| s.red().to_string()),
        },
        "plain" => Theme {
            prompt: "$ ".to_string(),
            continuation_prompt: "> ".to_string(),
            error_symbol: "!".to_string(),
            welcome_message: String::new(),
            exit_message: String::new(),
            error_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}
