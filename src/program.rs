//! Generator that turns an ordered list of [`Target`]s into a RAPID program.
//!
//! The entry point is [`ProgramGenerator`]. Configure it with a [`ProgramConfig`],
//! then call [`ProgramGenerator::generate`] for in-memory text or
//! [`ProgramGenerator::write`] to produce the module and descriptor files that
//! [`upload_and_run`](crate::session::MastershipGuard::upload_and_run) deploys.

use crate::error::ControllerError;
use crate::target::Target;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A named RAPID data declaration emitted once at module scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataDeclaration {
    pub name: String,
    /// Aggregate value in RAPID literal syntax.
    pub value: String,
}

impl DataDeclaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Configuration for program generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// RAPID module name. The module file is `<module_name>.mod`.
    pub module_name: String,
    /// Routine the descriptor names as the program entry.
    pub entry_routine: String,
    /// Routine holding the motion statements, called from the entry routine.
    pub body_routine: String,
    /// `speeddata` used by every move.
    pub speed: String,
    /// `zonedata` used by every move.
    pub zone: String,
    /// `tooldata` declared as `PERS` and used by every move.
    pub tool: DataDeclaration,
    /// `wobjdata` declared as `TASK PERS` and used by every move.
    pub work_object: DataDeclaration,
    /// File name of the program descriptor written next to the module.
    pub descriptor_file_name: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            module_name: "MainModule".to_string(),
            entry_routine: "main".to_string(),
            body_routine: "rStart".to_string(),
            speed: "v100".to_string(),
            zone: "z1".to_string(),
            tool: DataDeclaration::new(
                "tPen",
                "[TRUE,[[-50.828842163,-0.015067339,170.179992676],[1,0,0,0]],\
                 [1,[-46.200036966,0.000035189,42.434212285],[1,0,0,0],0,0,0]]",
            ),
            work_object: DataDeclaration::new(
                "WobjPad",
                "[FALSE,TRUE,\"\",[[-295.62617401,17.579148369,72.979639055],[1,0,0,0]],\
                 [[0,0,0],[1,0,0,0]]]",
            ),
            descriptor_file_name: "Dynamo.prg".to_string(),
        }
    }
}

impl ProgramConfig {
    pub fn module_file_name(&self) -> String {
        format!("{}.mod", self.module_name)
    }
}

/// The two text artifacts of one generation call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RapidProgram {
    /// RAPID module source.
    pub module: String,
    /// XML program descriptor naming the entry routine and the module file.
    pub descriptor: String,
}

/// Where [`ProgramGenerator::write`] put the program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramFiles {
    pub module_path: PathBuf,
    pub descriptor_path: PathBuf,
}

impl ProgramFiles {
    /// Module at `module_path` with the descriptor `config` places next to it.
    pub fn for_module(module_path: impl Into<PathBuf>, config: &ProgramConfig) -> Self {
        let module_path = module_path.into();
        let descriptor_path = descriptor_path_for(&module_path, config);
        Self {
            module_path,
            descriptor_path,
        }
    }
}

/// Serializes targets into RAPID program text.
pub struct ProgramGenerator {
    config: ProgramConfig,
}

impl ProgramGenerator {
    pub fn new(config: ProgramConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Generates the module and a descriptor referencing `<module_name>.mod`.
    ///
    /// The i-th target is declared as `b{i}` and the moves follow input order.
    /// An empty slice yields a valid program that performs no motion.
    pub fn generate(&self, targets: &[Target]) -> RapidProgram {
        self.render(targets, &self.config.module_file_name())
    }

    /// Writes the module to `module_path` and the descriptor next to it.
    ///
    /// Both files are flushed and closed before this returns, so they can be
    /// handed to a transfer straight away.
    pub fn write(
        &self,
        targets: &[Target],
        module_path: impl AsRef<Path>,
    ) -> Result<ProgramFiles, ControllerError> {
        let module_path = module_path.as_ref();
        let module_file = module_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.module_file_name());
        let descriptor_path = descriptor_path_for(module_path, &self.config);

        let program = self.render(targets, &module_file);
        write_text(module_path, &program.module)?;
        write_text(&descriptor_path, &program.descriptor)?;

        info!(
            module = %module_path.display(),
            descriptor = %descriptor_path.display(),
            targets = targets.len(),
            "wrote RAPID program"
        );

        Ok(ProgramFiles {
            module_path: module_path.to_path_buf(),
            descriptor_path,
        })
    }

    fn render(&self, targets: &[Target], module_file: &str) -> RapidProgram {
        let cfg = &self.config;
        let ids: Vec<String> = (0..targets.len()).map(|i| format!("b{i}")).collect();

        let declarations: String = ids
            .iter()
            .zip(targets)
            .map(|(id, target)| format!("\tCONST robtarget {id}:={target};\n"))
            .collect();

        let moves: String = ids
            .iter()
            .map(|id| {
                format!(
                    "\t\tMoveL {id},{},{},{}\\WObj:={};\n",
                    cfg.speed, cfg.zone, cfg.tool.name, cfg.work_object.name
                )
            })
            .collect();

        let module = format!(
            "MODULE {module}\n\
             \tPERS tooldata {tool}:={tool_value};\n\
             \tTASK PERS wobjdata {wobj}:={wobj_value};\n\
             \t! targets for curve\n\
             {declarations}\n\
             \t! Main routine\n\
             \tPROC {entry}()\n\
             \n\
             \t\tConfL \\Off;\n\
             \t\t{body};\n\
             \t\tRETURN;\n\
             \tENDPROC\n\
             \tPROC {body}()\n\
             {moves}\n\
             \t\tRETURN;\n\
             \tENDPROC\n\
             ENDMODULE\n",
            module = cfg.module_name,
            tool = cfg.tool.name,
            tool_value = cfg.tool.value,
            wobj = cfg.work_object.name,
            wobj_value = cfg.work_object.value,
            entry = cfg.entry_routine,
            body = cfg.body_routine,
        );

        let descriptor = format!(
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
             <Program entry=\"{}\">\n\
             <Module>{}</Module>\n\
             </Program>\n",
            cfg.entry_routine, module_file
        );

        debug!(targets = targets.len(), "generated RAPID module");
        RapidProgram { module, descriptor }
    }
}

impl Default for ProgramGenerator {
    fn default() -> Self {
        Self::new(ProgramConfig::default())
    }
}

/// Builds one default target per point, preserving order.
pub fn points_to_targets(points: &[DVec3]) -> Vec<Target> {
    points.iter().copied().map(Target::from_point).collect()
}

/// Location of the descriptor that accompanies `module_path`.
pub fn descriptor_path_for(module_path: &Path, config: &ProgramConfig) -> PathBuf {
    module_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&config.descriptor_file_name)
}

fn write_text(path: &Path, text: &str) -> Result<(), ControllerError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
