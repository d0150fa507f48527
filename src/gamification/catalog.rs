//! Reference data seeded into `achievements` and `roles` at startup.

/// Key of the achievement granted on first registration.
pub const WELCOME_KEY: &str = "welcome";

#[derive(Debug, Clone, Copy)]
pub struct AchievementSeed {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_reward: i32,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RoleSeed {
    pub name: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_ACHIEVEMENTS: &[AchievementSeed] = &[
    AchievementSeed {
        key: WELCOME_KEY,
        name: "Welcome!",
        description: "Created an account and joined the board.",
        xp_reward: 10,
        icon: "rocket",
    },
    AchievementSeed {
        key: "project_planner",
        name: "Project Planner",
        description: "Created your first project.",
        xp_reward: 25,
        icon: "notebook-pen",
    },
    AchievementSeed {
        key: "first_task",
        name: "First Task Done",
        description: "Completed your first task.",
        xp_reward: 15,
        icon: "folder-check",
    },
    AchievementSeed {
        key: "team_member",
        name: "Team Member",
        description: "Joined a project as a member.",
        xp_reward: 30,
        icon: "handshake",
    },
    AchievementSeed {
        key: "warming_up",
        name: "Warming Up",
        description: "Completed five tasks.",
        xp_reward: 30,
        icon: "flame",
    },
    AchievementSeed {
        key: "code_connection",
        name: "Code Connection",
        description: "Linked a repository to a project.",
        xp_reward: 50,
        icon: "link",
    },
    AchievementSeed {
        key: "trusted_delegator",
        name: "Trusted Delegator",
        description: "Assigned a task to a teammate.",
        xp_reward: 20,
        icon: "shield-check",
    },
    AchievementSeed {
        key: "got_your_back",
        name: "Got Your Back",
        description: "Completed a task assigned by a teammate.",
        xp_reward: 35,
        icon: "sticker",
    },
    AchievementSeed {
        key: "contributor",
        name: "Contributor",
        description: "Completed twenty tasks across your projects.",
        xp_reward: 80,
        icon: "gem",
    },
];

pub const DEFAULT_ROLES: &[RoleSeed] = &[
    RoleSeed {
        name: "Owner",
        description: "Full control over the project, including deletion.",
    },
    RoleSeed {
        name: "Admin",
        description: "Manages members, columns and tasks.",
    },
    RoleSeed {
        name: "Member",
        description: "Works on tasks within the project.",
    },
];
