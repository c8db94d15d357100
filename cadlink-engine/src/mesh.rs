//! 网格转换。绘图端多面网格索引从 1 开始，自由曲面端从 0 开始。

use cadlink_core::{
    drafting::{
        Document, DocumentError, Entity, EntityId, PolyFaceMesh, SubDMesh, Transaction,
    },
    freeform::{Mesh, MeshFace},
    geometry::Point3,
};
use tracing::debug;

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::primitive::{point_to_source, point_to_target};

fn vertex_index(raw: usize, vertex_count: usize, entity: &'static str) -> Result<usize, ConvertError> {
    if raw < vertex_count {
        Ok(raw)
    } else {
        Err(ConvertError::malformed(
            entity,
            format!("vertex index {raw} out of {vertex_count}"),
        ))
    }
}

fn face_from_indices(indices: &[usize], entity: &'static str) -> Result<MeshFace, ConvertError> {
    match *indices {
        [a, b, c] => Ok(MeshFace::triangle(a, b, c)),
        [a, b, c, d] => Ok(MeshFace::quad(a, b, c, d)),
        _ => Err(ConvertError::malformed(
            entity,
            format!("face with {} vertices", indices.len()),
        )),
    }
}

/// 1 基索引减一；负号（不可见边）丢弃，第四个索引为 0 时视为三角形。
pub fn polyface_to_target(
    mesh: &PolyFaceMesh,
    ctx: &ConversionContext,
) -> Result<Mesh, ConvertError> {
    let vertex_count = mesh.vertices.len();
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let indices = face
            .iter()
            .filter(|raw| **raw != 0)
            .map(|raw| vertex_index(raw.unsigned_abs() as usize - 1, vertex_count, "polyface mesh"))
            .collect::<Result<Vec<_>, _>>()?;
        faces.push(face_from_indices(&indices, "polyface mesh")?);
    }
    Ok(Mesh {
        vertices: mesh
            .vertices
            .iter()
            .map(|p| point_to_target(*p, ctx))
            .collect(),
        faces,
    })
}

/// 解析计数前缀的面数组，超过四边的面按扇形三角化。
pub fn subd_to_target(mesh: &SubDMesh, ctx: &ConversionContext) -> Result<Mesh, ConvertError> {
    let vertex_count = mesh.vertices.len();
    let mut faces = Vec::new();
    let mut cursor = 0;
    while cursor < mesh.face_array.len() {
        let count = usize::try_from(mesh.face_array[cursor])
            .ok()
            .filter(|count| *count >= 3)
            .ok_or_else(|| {
                ConvertError::malformed(
                    "subd mesh",
                    format!("invalid face size {}", mesh.face_array[cursor]),
                )
            })?;
        let raw = mesh
            .face_array
            .get(cursor + 1..cursor + 1 + count)
            .ok_or_else(|| ConvertError::malformed("subd mesh", "truncated face array"))?;
        let indices = raw
            .iter()
            .map(|index| {
                usize::try_from(*index)
                    .map_err(|_| {
                        ConvertError::malformed("subd mesh", format!("negative index {index}"))
                    })
                    .and_then(|index| vertex_index(index, vertex_count, "subd mesh"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if count <= 4 {
            faces.push(face_from_indices(&indices, "subd mesh")?);
        } else {
            for pair in indices[1..].windows(2) {
                faces.push(MeshFace::triangle(indices[0], pair[0], pair[1]));
            }
        }
        cursor += count + 1;
    }
    debug!(
        vertices = vertex_count,
        faces = faces.len(),
        smooth_level = mesh.smooth_level,
        "细分网格已展开"
    );
    Ok(Mesh {
        vertices: mesh
            .vertices
            .iter()
            .map(|p| point_to_target(*p, ctx))
            .collect(),
        faces,
    })
}

fn check_faces(mesh: &Mesh) -> Result<(), ConvertError> {
    for face in &mesh.faces {
        for index in face.indices() {
            vertex_index(index, mesh.vertices.len(), "mesh")?;
        }
    }
    Ok(())
}

fn source_vertices(mesh: &Mesh, ctx: &ConversionContext) -> Vec<Point3> {
    mesh.vertices
        .iter()
        .map(|p| point_to_source(*p, ctx))
        .collect()
}

fn polyface_index(index: usize) -> Result<i32, ConvertError> {
    i32::try_from(index + 1)
        .map_err(|_| ConvertError::malformed("mesh", format!("vertex index {index} too large")))
}

fn polyface_faces(mesh: &Mesh) -> Result<Vec<[i32; 4]>, ConvertError> {
    mesh.faces
        .iter()
        .map(|face| {
            let d = if face.is_triangle() {
                0
            } else {
                polyface_index(face.d)?
            };
            Ok([
                polyface_index(face.a)?,
                polyface_index(face.b)?,
                polyface_index(face.c)?,
                d,
            ])
        })
        .collect()
}

/// 生成游离的多面网格，索引加一。
pub fn mesh_to_polyface(mesh: &Mesh, ctx: &ConversionContext) -> Result<PolyFaceMesh, ConvertError> {
    check_faces(mesh)?;
    Ok(PolyFaceMesh {
        vertices: source_vertices(mesh, ctx),
        faces: polyface_faces(mesh)?,
    })
}

/// 生成游离的细分网格。
pub fn mesh_to_subd(mesh: &Mesh, ctx: &ConversionContext) -> Result<SubDMesh, ConvertError> {
    check_faces(mesh)?;
    let mut face_array = Vec::with_capacity(mesh.faces.len() * 5);
    for face in &mesh.faces {
        let indices = face.indices();
        face_array.push(indices.len() as i32);
        for index in indices {
            face_array.push(
                i32::try_from(index).map_err(|_| {
                    ConvertError::malformed("mesh", format!("vertex index {index} too large"))
                })?,
            );
        }
    }
    Ok(SubDMesh {
        vertices: source_vertices(mesh, ctx),
        face_array,
        smooth_level: 0,
    })
}

fn polyface_mut<'t>(
    transaction: &'t mut Transaction<'_>,
    id: EntityId,
) -> Result<&'t mut PolyFaceMesh, DocumentError> {
    match transaction.entity_mut(id)? {
        Entity::PolyFaceMesh(mesh) => Ok(mesh),
        other => Err(DocumentError::UnexpectedEntity {
            id: id.get(),
            expected: "polyface_mesh",
            actual: other.type_tag(),
        }),
    }
}

/// 在调用方文档中创建多面网格：持锁并在事务内追加，先建空网格再填充顶点与面。
/// 任一步失败时事务回滚，文档中不留下半成品。
pub fn mesh_to_document(
    mesh: &Mesh,
    document: &mut Document,
    ctx: &ConversionContext,
) -> Result<EntityId, ConvertError> {
    let mut lock = document.lock();
    let mut transaction = lock.start_transaction();
    let id = transaction.append(Entity::PolyFaceMesh(PolyFaceMesh::default()));

    let vertices = source_vertices(mesh, ctx);
    polyface_mut(&mut transaction, id)?.vertices = vertices;

    check_faces(mesh)?;
    let faces = polyface_faces(mesh)?;
    polyface_mut(&mut transaction, id)?.faces = faces;

    transaction.commit();
    debug!(entity = id.get(), faces = mesh.faces.len(), "网格已写入文档");
    Ok(id)
}
