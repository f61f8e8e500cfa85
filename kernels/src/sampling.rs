//! Sampling kernels (spec.md section 2, L1 "Sampling kernels"): uniform
//! disk/triangle/hexagon/sphere and cosine-hemisphere sampling, orthonormal
//! basis construction, and exact Fresnel. The teacher's `util::create_cartesian`
//! and `util::cosine_sample_hemisphere` are kept and generalized here; the
//! hexagon sampler, exact dielectric/conductor Fresnel, and solid-angle cone
//! sampling are new, grounded in `original_source/Core/Math/*` and the BSDF
//! `.cpp` files (spec.md section 4.6 supplement).

use glam::Vec3;
use std::f32::consts::PI;

/// Builds an orthonormal basis `(tangent, bitangent)` around unit `n`, such
/// that `n x tangent = bitangent` (spec.md section 8, universal invariant).
/// Uses the teacher's arbitrary-vector cross-product construction.
pub fn build_orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    // Duff et al.'s branchless construction is more numerically robust at
    // the poles than an arbitrary fixed "up" vector, and is what the
    // packet/SIMD paths need since they can't branch per-lane cheaply.
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    let tangent = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    (tangent, bitangent)
}

/// Legacy three-vector form used by a couple of existing call sites; returns
/// `(up, tangent, bitangent)` with `up == n`.
pub fn create_cartesian(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let (t, b) = build_orthonormal_basis(up);
    (up, t, b)
}

/// Cosine-weighted direction in the local shading frame, `z` the normal
/// (spec.md section 3's local-frame convention). The teacher's
/// `util::cosine_sample_hemisphere` puts the cosine term in `y` because its
/// callers combine the result against an explicit `(tangent, up, bitangent)`
/// triple; every BSDF here instead reads `direction_local.z` directly, so
/// the cosine term is generated in `z` up front.
pub fn cosine_sample_hemisphere(r1: f32, r2: f32) -> Vec3 {
    let theta = r1.sqrt().acos();
    let phi = 2.0 * PI * r2;
    Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
}

/// Cosine-weighted direction around `normal` in world space; PDF is
/// `cos(theta) / PI` (spec.md section 4.5.1).
pub fn cosine_sample_hemisphere_around(normal: Vec3, r1: f32, r2: f32) -> Vec3 {
    let (t, b) = build_orthonormal_basis(normal);
    let local = cosine_sample_hemisphere(r1, r2);
    (t * local.x + b * local.y + normal * local.z).normalize()
}

/// Concentric (Shirley-Chiu) disk sample — lower distortion than the polar
/// mapping, used by `sample_by_ref` for area lights that need an in-plane
/// offset.
pub fn uniform_sample_disk_concentric(r1: f32, r2: f32) -> (f32, f32) {
    let ox = 2.0 * r1 - 1.0;
    let oy = 2.0 * r2 - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return (0.0, 0.0);
    }
    let (r, theta) = if ox.abs() > oy.abs() {
        (ox, (PI / 4.0) * (oy / ox))
    } else {
        (oy, (PI / 2.0) - (PI / 4.0) * (ox / oy))
    };
    (r * theta.cos(), r * theta.sin())
}

/// Uniform barycentric sample over a triangle (Shirley-Chiu square-to-triangle).
pub fn uniform_sample_triangle(r1: f32, r2: f32) -> (f32, f32) {
    let sqrt_r1 = r1.sqrt();
    (1.0 - sqrt_r1, r2 * sqrt_r1)
}

/// Uniform sample over a regular hexagon of circumradius 1, used by the
/// aperture sampler for hexagonal bokeh. Picks one of the six triangular
/// wedges uniformly, then a uniform point within it.
pub fn uniform_sample_hexagon(r1: f32, r2: f32, r3: f32) -> (f32, f32) {
    let wedge = (r1 * 6.0).floor().min(5.0);
    let (b0, b1) = uniform_sample_triangle(r2, r3);
    let b2 = 1.0 - b0 - b1;
    let theta0 = wedge * PI / 3.0;
    let theta1 = (wedge + 1.0) * PI / 3.0;
    let p0 = Vec3::new(0.0, 0.0, 0.0);
    let p1 = Vec3::new(theta0.cos(), theta0.sin(), 0.0);
    let p2 = Vec3::new(theta1.cos(), theta1.sin(), 0.0);
    let p = p0 * b0 + p1 * b1 + p2 * b2;
    (p.x, p.y)
}

/// Marsaglia's square-to-sphere map: uniform point on the unit sphere
/// (spec.md section 4.4.1, sphere area sampling).
pub fn uniform_sample_sphere(r1: f32, r2: f32) -> Vec3 {
    let u = 2.0 * r1 - 1.0;
    let phi = 2.0 * PI * r2;
    let root = (1.0 - u * u).max(0.0).sqrt();
    Vec3::new(root * phi.cos(), root * phi.sin(), u)
}

/// Uniform sample over a spherical cap of half-angle `cos_theta_max` around
/// `+z` in local space, used by `SphereShape::sample_by_ref` (spec.md
/// section 4.4.1).
pub fn uniform_sample_cone(r1: f32, r2: f32, cos_theta_max: f32) -> Vec3 {
    let cos_theta = (1.0 - r1) + r1 * cos_theta_max;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * r2;
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

pub fn uniform_cone_pdf(cos_theta_max: f32) -> f32 {
    1.0 / (2.0 * PI * (1.0 - cos_theta_max))
}

/// Exact Fresnel reflectance for a dielectric interface (not Schlick's
/// approximation — spec.md section 3, "Supplemented features"), `cos_i` is
/// the unsigned cosine of the angle of incidence and `eta` is
/// `ior_transmitted / ior_incident`.
pub fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let cos_i = cos_i.clamp(-1.0, 1.0);
    let (cos_i, eta) = if cos_i < 0.0 {
        (-cos_i, 1.0 / eta)
    } else {
        (cos_i, eta)
    };

    let sin2_t = (1.0 - cos_i * cos_i) / (eta * eta);
    if sin2_t >= 1.0 {
        return 1.0; // total internal reflection
    }
    let cos_t = (1.0 - sin2_t).max(0.0).sqrt();

    let r_parallel = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    let r_perp = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
    0.5 * (r_parallel * r_parallel + r_perp * r_perp)
}

/// Exact Fresnel reflectance for a conductor (metal), parameterized by IoR
/// `eta` and extinction coefficient `k` (spec.md section 4.5.5). Unlike the
/// dielectric case this never totally transmits.
pub fn fresnel_conductor(cos_i: f32, eta: f32, k: f32) -> f32 {
    let cos_i = cos_i.clamp(0.0, 1.0);
    let cos_i2 = cos_i * cos_i;
    let sin_i2 = 1.0 - cos_i2;
    let eta2 = eta * eta;
    let k2 = k * k;

    let t0 = eta2 - k2 - sin_i2;
    let a2_plus_b2 = (t0 * t0 + 4.0 * eta2 * k2).max(0.0).sqrt();
    let t1 = a2_plus_b2 + cos_i2;
    let a = (0.5 * (a2_plus_b2 + t0)).max(0.0).sqrt();
    let t2 = 2.0 * a * cos_i;
    let rs = (t1 - t2) / (t1 + t2);

    let t3 = cos_i2 * a2_plus_b2 + sin_i2 * sin_i2;
    let t4 = t2 * sin_i2;
    let rp = rs * (t3 - t4) / (t3 + t4);

    0.5 * (rs + rp)
}

/// Refracts `wo` (pointing away from the surface) through a macro-normal `n`
/// with relative IoR `eta = ior_incident / ior_transmitted`. Returns `None`
/// on total internal reflection.
pub fn refract(wo: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = wo.dot(n);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).max(0.0).sqrt();
    Some(-wo * eta + n * (eta * cos_i - cos_t))
}

pub fn reflect(wo: Vec3, n: Vec3) -> Vec3 {
    -wo + n * 2.0 * wo.dot(n)
}

/// Cauchy's-equation dispersion: `eta(lambda) = eta0 + C/lambda^2 + D/lambda^4`
/// (spec.md section 4.5.3), `lambda_nm` in nanometers.
pub fn cauchy_ior(eta0: f32, c: f32, d: f32, lambda_nm: f32) -> f32 {
    let lambda_um = lambda_nm * 1e-3; // Cauchy's equation is conventionally in micrometers
    eta0 + c / (lambda_um * lambda_um) + d / (lambda_um * lambda_um * lambda_um * lambda_um)
}
