//! The fixed set of launchers this application manages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LauncherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LauncherId {
    #[serde(rename = "Steam_ALL", alias = "Steam")]
    Steam,
    Ubisoft,
    #[serde(rename = "EA")]
    Ea,
    Epic,
    Rockstar,
}

/// Steam app id of Red Dead Redemption 2, whose binaries sit behind the
/// Rockstar launcher.
pub const RDR2_APP_ID: u32 = 1_174_180;

/// Where a companion's relative path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Directory of the launcher's main executable.
    LauncherDir,
    /// Install directory of a Steam app, or `fallback` when Steam cannot
    /// report it.
    SteamApp { app_id: u32, fallback: &'static str },
}

/// An executable blocked alongside the launcher's main binary.
#[derive(Debug, Clone, Copy)]
pub struct Companion {
    pub relative: &'static str,
    /// Fixed firewall rule name. `None` means the numbered scheme.
    pub rule: Option<&'static str>,
    pub anchor: Anchor,
}

const RDR2_FALLBACK_DIR: &str = r"D:\SteamLibrary\steamapps\common\Red Dead Redemption 2";

#[derive(Debug)]
pub struct LauncherInfo {
    pub id: LauncherId,
    /// Wire key shared with the web view and used in rule names.
    pub key: &'static str,
    pub name: &'static str,
    pub name_key: &'static str,
    pub desc_key: &'static str,
    pub primary_rule: Option<&'static str>,
    pub candidates: &'static [&'static str],
    pub companions: &'static [Companion],
}

pub static LAUNCHERS: [LauncherInfo; 5] = [
    LauncherInfo {
        id: LauncherId::Steam,
        key: "Steam_ALL",
        name: "Steam",
        name_key: "launchers.names.steam",
        desc_key: "launchers.desc.steam",
        primary_rule: Some("Block Steam Exe"),
        candidates: &[
            r"C:\Program Files (x86)\Steam\steam.exe",
            r"C:\Program Files\Steam\steam.exe",
            r"D:\Steam\steam.exe",
            r"E:\Steam\steam.exe",
        ],
        companions: &[Companion {
            relative: r"bin\cef\cef.win7x64\steamwebhelper.exe",
            rule: Some("Block Steam WebHelper"),
            anchor: Anchor::LauncherDir,
        }],
    },
    LauncherInfo {
        id: LauncherId::Ubisoft,
        key: "Ubisoft",
        name: "Ubisoft Connect",
        name_key: "launchers.names.ubisoft",
        desc_key: "launchers.desc.ubisoft",
        primary_rule: None,
        candidates: &[
            r"C:\Program Files (x86)\Ubisoft\Ubisoft Game Launcher\upc.exe",
            r"C:\Program Files\Ubisoft\Ubisoft Game Launcher\upc.exe",
            r"D:\Ubisoft\Ubisoft Game Launcher\upc.exe",
            r"E:\Ubisoft\Ubisoft Game Launcher\upc.exe",
        ],
        companions: &[],
    },
    LauncherInfo {
        id: LauncherId::Ea,
        key: "EA",
        name: "EA App",
        name_key: "launchers.names.ea",
        desc_key: "launchers.desc.ea",
        primary_rule: None,
        candidates: &[
            r"C:\Program Files\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
            r"C:\Program Files (x86)\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
            r"D:\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
            r"E:\EA Desktop\EA Desktop\EADesktop.exe",
        ],
        companions: &[],
    },
    LauncherInfo {
        id: LauncherId::Epic,
        key: "Epic",
        name: "Epic Games",
        name_key: "launchers.names.epic",
        desc_key: "launchers.desc.epic",
        primary_rule: None,
        candidates: &[
            r"C:\Program Files (x86)\Epic Games\Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe",
            r"C:\Program Files\Epic Games\Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe",
            r"D:\Epic Games\Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe",
            r"E:\Epic Games\Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe",
        ],
        companions: &[],
    },
    LauncherInfo {
        id: LauncherId::Rockstar,
        key: "Rockstar",
        name: "Rockstar Games",
        name_key: "launchers.names.rockstar",
        desc_key: "launchers.desc.rockstar",
        primary_rule: None,
        candidates: &[
            r"C:\Program Files\Rockstar Games\Launcher\Launcher.exe",
            r"C:\Program Files (x86)\Rockstar Games\Launcher\Launcher.exe",
            r"D:\Rockstar Games\Launcher\Launcher.exe",
            r"E:\Rockstar Games\Launcher\Launcher.exe",
        ],
        companions: &[
            Companion {
                relative: r"..\Social Club\SocialClubHelper.exe",
                rule: None,
                anchor: Anchor::LauncherDir,
            },
            Companion {
                relative: "RockstarService.exe",
                rule: None,
                anchor: Anchor::LauncherDir,
            },
            Companion {
                relative: r"ThirdParty\Crashpad\RockstarErrorHandler.exe",
                rule: None,
                anchor: Anchor::LauncherDir,
            },
            Companion {
                relative: "RDR2.exe",
                rule: None,
                anchor: Anchor::SteamApp {
                    app_id: RDR2_APP_ID,
                    fallback: RDR2_FALLBACK_DIR,
                },
            },
            Companion {
                relative: "PlayRDR2.exe",
                rule: None,
                anchor: Anchor::SteamApp {
                    app_id: RDR2_APP_ID,
                    fallback: RDR2_FALLBACK_DIR,
                },
            },
        ],
    },
];

impl LauncherId {
    pub const ALL: [LauncherId; 5] = [
        LauncherId::Steam,
        LauncherId::Ubisoft,
        LauncherId::Ea,
        LauncherId::Epic,
        LauncherId::Rockstar,
    ];

    pub fn info(self) -> &'static LauncherInfo {
        match self {
            LauncherId::Steam => &LAUNCHERS[0],
            LauncherId::Ubisoft => &LAUNCHERS[1],
            LauncherId::Ea => &LAUNCHERS[2],
            LauncherId::Epic => &LAUNCHERS[3],
            LauncherId::Rockstar => &LAUNCHERS[4],
        }
    }

    pub fn key(self) -> &'static str {
        self.info().key
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl fmt::Display for LauncherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LauncherId {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Steam" {
            return Ok(LauncherId::Steam);
        }
        LauncherId::ALL
            .into_iter()
            .find(|id| id.key() == s)
            .ok_or_else(|| LauncherError::UnknownLauncher(s.to_string()))
    }
}
