//! Worker command line construction

use agent_team_controller_core::config::WorkerConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Environment markers every worker receives.
const PROTOCOL_ENV: [(&str, &str); 2] = [
    ("CLAUDECODE", "1"),
    ("CLAUDE_CODE_EXPERIMENTAL_AGENT_TEAMS", "1"),
];

/// How worker processes are launched
#[derive(Debug, Clone)]
pub struct Launcher {
    /// Worker CLI binary
    pub binary: PathBuf,
    /// Arguments placed before the identity flags
    pub args: Vec<String>,
    /// Pseudo-terminal wrapper; `None` launches the binary directly
    pub pty_wrapper: Option<PathBuf>,
    /// Environment applied to every worker
    pub env: BTreeMap<String, String>,
}

impl Launcher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            pty_wrapper: None,
            env: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            pty_wrapper: config.pty_wrapper.clone(),
            env: config.env.clone(),
        }
    }

    /// Full command line for one worker
    ///
    /// `[wrapper] binary [launcher args] [request args] <identity flags>`.
    /// Nothing follows the identity flags, so request args cannot override them.
    /// Environment is the protocol markers, then launcher env, then request
    /// env, later entries winning.
    pub fn command_line(&self, request: &SpawnRequest) -> CommandLine {
        let mut args: Vec<String> = Vec::new();
        let program = match &self.pty_wrapper {
            Some(wrapper) => {
                args.push(self.binary.to_string_lossy().into_owned());
                wrapper.clone()
            }
            None => self.binary.clone(),
        };

        args.extend(self.args.iter().cloned());
        args.extend(request.extra_args.iter().cloned());
        args.extend(request.identity_flags());

        let mut env: BTreeMap<String, String> = PROTOCOL_ENV
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env.extend(self.env.clone());
        env.extend(request.env.clone());

        CommandLine {
            program,
            args,
            env,
            cwd: request.cwd.clone(),
        }
    }
}

/// A resolved process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

/// Identity and options for one worker
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    /// Agent name, unique within the team
    pub name: String,
    pub team: String,
    /// `name@team`
    pub agent_id: String,
    pub agent_type: Option<String>,
    pub color: Option<String>,
    pub parent_session_id: Option<String>,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
    pub allowed_tools: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub extra_args: Vec<String>,
}

impl SpawnRequest {
    fn identity_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "--agent-id".to_string(),
            self.agent_id.clone(),
            "--agent-name".to_string(),
            self.name.clone(),
            "--team-name".to_string(),
            self.team.clone(),
        ];

        let optional = [
            ("--agent-type", &self.agent_type),
            ("--agent-color", &self.color),
            ("--parent-session-id", &self.parent_session_id),
            ("--model", &self.model),
            ("--permission-mode", &self.permission_mode),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                flags.push(flag.to_string());
                flags.push(value.clone());
            }
        }

        for tool in &self.allowed_tools {
            flags.push("--allowedTools".to_string());
            flags.push(tool.clone());
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SpawnRequest {
        SpawnRequest {
            name: "w1".into(),
            team: "alpha".into(),
            agent_id: "w1@alpha".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_identity_flags() {
        let line = Launcher::new("claude").command_line(&request());
        assert_eq!(line.program, PathBuf::from("claude"));
        assert_eq!(
            line.args,
            [
                "--agent-id",
                "w1@alpha",
                "--agent-name",
                "w1",
                "--team-name",
                "alpha"
            ]
        );
    }

    #[test]
    fn test_optional_flags_and_repeated_tools() {
        let mut req = request();
        req.agent_type = Some("Plan".into());
        req.color = Some("blue".into());
        req.parent_session_id = Some("s-1".into());
        req.model = Some("m".into());
        req.permission_mode = Some("plan".into());
        req.allowed_tools = vec!["Read".into(), "Bash(ls:*)".into()];
        req.extra_args = vec!["--verbose".into()];

        let args = Launcher::new("claude").command_line(&req).args;
        let joined = args.join(" ");
        assert!(joined.contains("--agent-type Plan"));
        assert!(joined.contains("--agent-color blue"));
        assert!(joined.contains("--parent-session-id s-1"));
        assert!(joined.contains("--model m"));
        assert!(joined.contains("--permission-mode plan"));
        assert!(joined.starts_with("--verbose --agent-id"));
        assert!(joined.ends_with("--allowedTools Read --allowedTools Bash(ls:*)"));
    }

    #[test]
    fn test_extra_args_cannot_override_identity() {
        let mut req = request();
        req.extra_args = vec!["--agent-id".into(), "spoof@alpha".into()];

        let args = Launcher::new("claude").command_line(&req).args;
        let last_id = args
            .iter()
            .rposition(|a| a == "--agent-id")
            .map(|i| args[i + 1].as_str());
        assert_eq!(last_id, Some("w1@alpha"));
        assert_eq!(&args[..2], ["--agent-id", "spoof@alpha"]);
    }

    #[test]
    fn test_wrapper_prefixes_binary_and_args() {
        let mut launcher = Launcher::new("/usr/bin/claude");
        launcher.pty_wrapper = Some(PathBuf::from("/opt/ptywrap"));
        launcher.args = vec!["--print".into()];

        let line = launcher.command_line(&request());
        assert_eq!(line.program, PathBuf::from("/opt/ptywrap"));
        assert_eq!(&line.args[..3], ["/usr/bin/claude", "--print", "--agent-id"]);
    }

    #[test]
    fn test_env_overrides_win_over_defaults() {
        let mut launcher = Launcher::new("claude");
        launcher.env.insert("SHARED".into(), "launcher".into());
        launcher.env.insert("ONLY_LAUNCHER".into(), "x".into());
        let mut req = request();
        req.env.insert("SHARED".into(), "request".into());
        req.env.insert("CLAUDECODE".into(), "0".into());

        let env = launcher.command_line(&req).env;
        assert_eq!(env["CLAUDE_CODE_EXPERIMENTAL_AGENT_TEAMS"], "1");
        assert_eq!(env["CLAUDECODE"], "0");
        assert_eq!(env["SHARED"], "request");
        assert_eq!(env["ONLY_LAUNCHER"], "x");
    }
}
